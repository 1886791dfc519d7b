#[cfg(test)]
pub mod test {
    use crate::types::{ConfDocument, StanzaKey};

    /// Global entries, a multi-line value, a comment, and two stanzas.
    pub const SAMPLE_CONF: &str = "\
key1 = value1
[stanza name]
key2 = value2
key3 = multi\\
line value
# a comment line

[web]
port = 80
";

    pub fn sample_doc() -> ConfDocument {
        let mut doc = ConfDocument::new();
        doc.set(StanzaKey::Global, "key1", "value1");
        doc.set("stanza name".into(), "key2", "value2");
        doc.set("stanza name".into(), "key3", "multi\nline value");
        doc.set("web".into(), "port", "80");
        doc
    }

    /// Build a document from `(stanza, key, value)` triples. An empty stanza
    /// name means the global stanza.
    pub fn doc(entries: &[(&str, &str, &str)]) -> ConfDocument {
        let mut doc = ConfDocument::new();
        for (stanza, key, value) in entries {
            let stanza = if stanza.is_empty() {
                StanzaKey::Global
            } else {
                StanzaKey::named(*stanza)
            };
            doc.set(stanza, *key, *value);
        }
        doc
    }

    // -- Layered app configuration: default + local -----------------------------

    pub const DEFAULT_PROPS: &str = "\
[web]
port = 80
host = example.com

[db]
pool = 5
url = postgres://db
";

    pub const LOCAL_PROPS: &str = "\
[web]
port = 443
timeout = 30

[cache]
ttl = 60
";

    #[test]
    fn doc_helper_maps_empty_name_to_global() {
        let d = doc(&[("", "a", "1"), ("s", "b", "2")]);
        assert_eq!(d.value(&StanzaKey::Global, "a"), Some("1"));
        assert_eq!(d.value(&"s".into(), "b"), Some("2"));
    }
}
