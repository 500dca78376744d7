//! Discovery payload rendering and parsing.
//!
//! A discovery result is either a listing (one `M<name>` line per method,
//! plus `R<name>` lines for nodes that route to sub-nodes) or a single
//! documentation string prefixed with `D`. The prefix disambiguates the two
//! because listing lines never start with `D`.

use peermux_protocol::split_field;

const DOC_PREFIX: char = 'D';
const METHOD_PREFIX: char = 'M';
const ROUTE_PREFIX: char = 'R';

/// Parsed reply to a discovery query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoverReply {
    /// Answer to an empty query: everything the remote peer exposes.
    Listing {
        methods: Vec<String>,
        routes: Vec<String>,
    },
    /// Documentation string for one named method.
    Doc(String),
}

impl DiscoverReply {
    /// Method names in a listing; empty for doc replies.
    pub fn methods(&self) -> &[String] {
        match self {
            DiscoverReply::Listing { methods, .. } => methods,
            DiscoverReply::Doc(_) => &[],
        }
    }
}

/// Renders the listing payload for a set of method names. Names must be
/// iterated in a stable order so repeated queries compare equal.
pub(crate) fn render_listing<'a>(names: impl Iterator<Item = &'a str>) -> String {
    let mut out = String::new();
    for name in names {
        out.push(METHOD_PREFIX);
        out.push_str(name);
        out.push('\n');
    }
    out
}

pub(crate) fn render_doc(doc: &str) -> String {
    let mut out = String::with_capacity(doc.len() + 1);
    out.push(DOC_PREFIX);
    out.push_str(doc);
    out
}

/// Parses a discovery result payload.
pub(crate) fn parse_reply(payload: &str) -> DiscoverReply {
    if let Some(doc) = payload.strip_prefix(DOC_PREFIX) {
        return DiscoverReply::Doc(doc.to_string());
    }
    let mut methods = Vec::new();
    let mut routes = Vec::new();
    let mut rest = payload;
    loop {
        let (line, tail) = split_field(rest);
        if let Some(name) = line.strip_prefix(METHOD_PREFIX) {
            methods.push(name.to_string());
        } else if let Some(name) = line.strip_prefix(ROUTE_PREFIX) {
            routes.push(name.to_string());
        }
        match tail {
            Some(tail) => rest = tail,
            None => break,
        }
    }
    DiscoverReply::Listing { methods, routes }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listing_renders_one_line_per_method() {
        let payload = render_listing(["add", "sub"].into_iter());
        assert_eq!(payload, "Madd\nMsub\n");
    }

    #[test]
    fn empty_listing_is_an_empty_payload() {
        assert_eq!(render_listing(std::iter::empty()), "");
    }

    #[test]
    fn parse_splits_methods_and_routes() {
        let reply = parse_reply("Madd\nMsub\nRnorth\n");
        assert_eq!(
            reply,
            DiscoverReply::Listing {
                methods: vec!["add".to_string(), "sub".to_string()],
                routes: vec!["north".to_string()],
            }
        );
        assert_eq!(reply.methods(), ["add", "sub"]);
    }

    #[test]
    fn parse_recognizes_doc_replies() {
        assert_eq!(
            parse_reply("Dadds two integers"),
            DiscoverReply::Doc("adds two integers".to_string())
        );
        // An empty doc string still carries the prefix.
        assert_eq!(parse_reply("D"), DiscoverReply::Doc(String::new()));
    }

    #[test]
    fn parse_of_empty_payload_is_an_empty_listing() {
        assert_eq!(
            parse_reply(""),
            DiscoverReply::Listing {
                methods: vec![],
                routes: vec![],
            }
        );
    }

    #[test]
    fn doc_round_trip_keeps_newlines() {
        let doc = "line one\nline two";
        assert_eq!(parse_reply(&render_doc(doc)), DiscoverReply::Doc(doc.to_string()));
    }
}
