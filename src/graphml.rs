//! A thin, best-effort GraphML reader/writer.
//!
//! No GraphQL composition engine has a GraphML analogue, and the
//! original Python system reads GraphML through `networkx`, which this
//! crate has no equivalent of, so this codec follows the documented
//! vertex/edge property list directly: only those properties are
//! interpreted, so a hand-rolled scanner is enough — pulling in a full
//! XML crate for a dozen known tag shapes would be the wrong trade for
//! a supplemental codec.
//!
//! The writer uses the property name itself as the GraphML `key` id
//! (`label_delegations` is already a valid XML name token), so no id
//! indirection table needs to round-trip; the reader still honors a
//! `key` element's `attr.name` mapping for files produced elsewhere.

use std::collections::HashMap;

use crate::error::{Result, SingleTestbedError};
use crate::graph::GraphStore;
use crate::model::{NodeClass, PropertyMap, RelationKind};
use crate::options::GraphMlLoadOptions;

/// Serializes every node and edge of `graph_id` to a GraphML document.
pub fn write_graphml(store: &dyn GraphStore, graph_id: &str) -> Result<String> {
    let mut node_ids = store.list_nodes(graph_id)?;
    node_ids.sort();

    let mut out = String::new();
    out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    out.push_str("<graphml xmlns=\"http://graphml.graphdrawing.org/xmlns\">\n");
    out.push_str("  <key id=\"Class\" for=\"node\" attr.name=\"Class\" attr.type=\"string\"/>\n");
    out.push_str("  <key id=\"Class\" for=\"edge\" attr.name=\"Class\" attr.type=\"string\"/>\n");
    out.push_str(&format!("  <graph id=\"{}\" edgedefault=\"directed\">\n", escape(graph_id)));

    for node_id in &node_ids {
        let (class, props) = store.node_props(graph_id, node_id)?;
        out.push_str(&format!("    <node id=\"{}\">\n", escape(node_id)));
        out.push_str(&format!("      <data key=\"Class\">{}</data>\n", escape(&class.to_string())));
        for (key, value) in &props {
            out.push_str(&format!("      <data key=\"{}\">{}</data>\n", escape(key), escape(value)));
        }
        out.push_str("    </node>\n");
    }

    for (a, b, rel, props) in store.list_edges(graph_id)? {
        out.push_str(&format!(
            "    <edge source=\"{}\" target=\"{}\">\n",
            escape(&a),
            escape(&b)
        ));
        out.push_str(&format!("      <data key=\"Class\">{}</data>\n", escape(&rel.to_string())));
        for (key, value) in &props {
            out.push_str(&format!("      <data key=\"{}\">{}</data>\n", escape(key), escape(value)));
        }
        out.push_str("    </edge>\n");
    }

    out.push_str("  </graph>\n</graphml>\n");
    Ok(out)
}

/// Parses a GraphML document into `graph_id`, which must not already
/// exist in `store`, using the default [`GraphMlLoadOptions`].
pub fn read_graphml(store: &mut dyn GraphStore, graph_id: &str, document: &str) -> Result<()> {
    read_graphml_with_options(store, graph_id, document, &GraphMlLoadOptions::default())
}

/// Like [`read_graphml`], but a `<data>` value equal to `options.sentinel`
/// is dropped rather than stored, matching the store's own "present but
/// unset" convention for whichever sentinel spelling a document uses.
pub fn read_graphml_with_options(
    store: &mut dyn GraphStore,
    graph_id: &str,
    document: &str,
    options: &GraphMlLoadOptions,
) -> Result<()> {
    let tokens = tokenize(document)?;

    let mut key_names: HashMap<String, String> = HashMap::new();
    let mut pending_node: Option<(String, Option<NodeClass>, PropertyMap)> = None;
    let mut pending_edge: Option<(String, String, Option<RelationKind>, PropertyMap)> = None;
    let mut pending_data_key: Option<String> = None;

    for token in tokens {
        match token {
            Token::Tag(tag) => {
                let (name, attrs, self_closing, closing) = parse_tag(&tag);
                match name.as_str() {
                    "key" if !closing => {
                        if let (Some(id), Some(attr_name)) = (attrs.get("id"), attrs.get("attr.name")) {
                            key_names.insert(id.clone(), attr_name.clone());
                        }
                    }
                    "node" if !closing => {
                        let id = attrs.get("id").cloned().ok_or_else(|| malformed("node missing 'id'"))?;
                        pending_node = Some((id, None, PropertyMap::new()));
                        if self_closing {
                            finish_node(store, graph_id, &mut pending_node)?;
                        }
                    }
                    "node" if closing => {
                        finish_node(store, graph_id, &mut pending_node)?;
                    }
                    "edge" if !closing => {
                        let source = attrs.get("source").cloned().ok_or_else(|| malformed("edge missing 'source'"))?;
                        let target = attrs.get("target").cloned().ok_or_else(|| malformed("edge missing 'target'"))?;
                        pending_edge = Some((source, target, None, PropertyMap::new()));
                        if self_closing {
                            finish_edge(store, graph_id, &mut pending_edge)?;
                        }
                    }
                    "edge" if closing => {
                        finish_edge(store, graph_id, &mut pending_edge)?;
                    }
                    "data" if !closing => {
                        let key = attrs.get("key").cloned().ok_or_else(|| malformed("data missing 'key'"))?;
                        pending_data_key = Some(key_names.get(&key).cloned().unwrap_or(key));
                    }
                    "data" if closing => {
                        pending_data_key = None;
                    }
                    _ => {}
                }
            }
            Token::Text(text) => {
                let Some(field_name) = pending_data_key.clone() else {
                    continue;
                };
                if field_name != "Class" && text == options.sentinel {
                    tracing::debug!(%field_name, "dropping sentinel GraphML property value");
                    continue;
                }
                if let Some((_, class, props)) = pending_node.as_mut() {
                    if field_name == "Class" {
                        *class = text.parse::<NodeClass>().ok();
                    } else {
                        props.insert(field_name, text);
                    }
                } else if let Some((_, _, rel, props)) = pending_edge.as_mut() {
                    if field_name == "Class" {
                        *rel = text.parse::<RelationKind>().ok();
                    } else {
                        props.insert(field_name, text);
                    }
                }
            }
        }
    }

    Ok(())
}

fn finish_node(
    store: &mut dyn GraphStore,
    graph_id: &str,
    pending: &mut Option<(String, Option<NodeClass>, PropertyMap)>,
) -> Result<()> {
    let Some((id, class, props)) = pending.take() else {
        return Ok(());
    };
    let class = class.ok_or_else(|| malformed(&format!("node '{id}' has no recognized Class")))?;
    store.add_node(graph_id, &id, class, props)
}

fn finish_edge(
    store: &mut dyn GraphStore,
    graph_id: &str,
    pending: &mut Option<(String, String, Option<RelationKind>, PropertyMap)>,
) -> Result<()> {
    let Some((source, target, rel, props)) = pending.take() else {
        return Ok(());
    };
    let rel = rel.ok_or_else(|| malformed(&format!("edge {source}->{target} has no recognized Class")))?;
    store.add_edge(graph_id, &source, &target, rel, props)
}

fn malformed(reason: &str) -> SingleTestbedError {
    SingleTestbedError::Store {
        message: format!("malformed GraphML document: {reason}"),
    }
}

enum Token {
    Tag(String),
    Text(String),
}

fn tokenize(xml: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let bytes = xml.as_bytes();
    let mut i = 0usize;
    while i < bytes.len() {
        if bytes[i] == b'<' {
            let end = xml[i..]
                .find('>')
                .map(|offset| i + offset)
                .ok_or_else(|| malformed("unterminated tag"))?;
            let tag = &xml[i + 1..end];
            if !tag.starts_with('?') && !tag.starts_with('!') {
                tokens.push(Token::Tag(tag.to_owned()));
            }
            i = end + 1;
        } else {
            let next = xml[i..].find('<').map(|offset| i + offset).unwrap_or(bytes.len());
            let text = unescape(xml[i..next].trim());
            if !text.is_empty() {
                tokens.push(Token::Text(text));
            }
            i = next;
        }
    }
    Ok(tokens)
}

/// Splits a raw tag body (without the surrounding `<`/`>`) into its name
/// and attribute map, and reports whether it is a closing (`/name`) or
/// self-closing (`name .../`) tag.
fn parse_tag(tag: &str) -> (String, HashMap<String, String>, bool, bool) {
    let closing = tag.starts_with('/');
    let body = tag.strip_prefix('/').unwrap_or(tag).trim_end();
    let self_closing = body.ends_with('/');
    let body = body.strip_suffix('/').unwrap_or(body).trim();

    let mut parts = body.splitn(2, char::is_whitespace);
    let name = parts.next().unwrap_or_default().to_owned();
    let rest = parts.next().unwrap_or_default();

    let mut attrs = HashMap::new();
    let mut remaining = rest.trim_start();
    while !remaining.is_empty() {
        let Some(eq_pos) = remaining.find('=') else {
            break;
        };
        let key = remaining[..eq_pos].trim().to_owned();
        remaining = remaining[eq_pos + 1..].trim_start();
        let Some(quote) = remaining.chars().next().filter(|c| *c == '"' || *c == '\'') else {
            break;
        };
        let after_quote = &remaining[1..];
        let Some(close) = after_quote.find(quote) else {
            break;
        };
        attrs.insert(key, unescape(&after_quote[..close]));
        remaining = after_quote[close + 1..].trim_start();
    }

    (name, attrs, self_closing, closing)
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

fn unescape(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
