//! English singular to plural conversion for Kubernetes kinds.
//!
//! The rule table is built once per process and shared read-only.

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

static PLURALIZER: LazyLock<Pluralizer> = LazyLock::new(Pluralizer::new);

/// Pluralize `word` with the process-wide table.
pub fn pluralize(word: &str) -> String {
    PLURALIZER.plural(word)
}

/// Lower-case a Kind and pluralize it into a resource name (`Ingress` -> `ingresses`).
pub fn kind_to_resource(kind: &str) -> String {
    pluralize(&kind.to_lowercase())
}

/// Stateless English pluralization rules.
pub struct Pluralizer {
    irregular: HashMap<&'static str, &'static str>,
    uncountable: HashSet<&'static str>,
}

impl Pluralizer {
    pub fn new() -> Self {
        let irregular = HashMap::from([
            ("person", "people"),
            ("man", "men"),
            ("woman", "women"),
            ("child", "children"),
            ("tooth", "teeth"),
            ("foot", "feet"),
            ("goose", "geese"),
            ("mouse", "mice"),
            ("ox", "oxen"),
        ]);
        let uncountable = HashSet::from([
            "deer",
            "equipment",
            "fish",
            "information",
            "money",
            "moose",
            "news",
            "police",
            "rice",
            "series",
            "sheep",
            "species",
            "traffic",
        ]);
        Self {
            irregular,
            uncountable,
        }
    }

    /// Plural form of a lower-case word.
    pub fn plural(&self, word: &str) -> String {
        if word.is_empty() || self.uncountable.contains(word) {
            return word.to_string();
        }
        if let Some(plural) = self.irregular.get(word) {
            return plural.to_string();
        }

        if word.ends_with("quiz") {
            return format!("{}zes", word);
        }
        if ["matrix", "vertex", "index"].iter().any(|s| word.ends_with(s)) {
            return format!("{}ices", &word[..word.len() - 2]);
        }
        if ["ch", "sh", "ss", "x", "z"].iter().any(|s| word.ends_with(s)) {
            return format!("{}es", word);
        }
        if let Some(stem) = word.strip_suffix('y') {
            let before = stem.chars().last();
            if stem.ends_with("qu") || before.is_some_and(|c| !is_vowel(c)) {
                return format!("{}ies", stem);
            }
            return format!("{}s", word);
        }
        if word.ends_with("fe") && !word.ends_with("ffe") {
            return format!("{}ves", &word[..word.len() - 2]);
        }
        if word.ends_with("lf") || word.ends_with("rf") {
            return format!("{}ves", &word[..word.len() - 1]);
        }
        if let Some(stem) = word.strip_suffix("sis") {
            return format!("{}ses", stem);
        }
        if word.ends_with("us") || word.ends_with("as") {
            return format!("{}es", word);
        }
        // Already plural (e.g. `endpoints`).
        if word.ends_with('s') {
            return word.to_string();
        }
        if ["buffalo", "echo", "hero", "potato", "tomato", "veto"]
            .iter()
            .any(|s| word.ends_with(s))
        {
            return format!("{}es", word);
        }
        format!("{}s", word)
    }
}

impl Default for Pluralizer {
    fn default() -> Self {
        Self::new()
    }
}

fn is_vowel(c: char) -> bool {
    matches!(c, 'a' | 'e' | 'i' | 'o' | 'u')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_kinds() {
        let cases = [
            ("Pod", "pods"),
            ("Service", "services"),
            ("Deployment", "deployments"),
            ("Ingress", "ingresses"),
            ("IngressClass", "ingressclasses"),
            ("NetworkPolicy", "networkpolicies"),
            ("Policy", "policies"),
            ("Endpoints", "endpoints"),
            ("EndpointSlice", "endpointslices"),
            ("ConfigMap", "configmaps"),
            ("Secret", "secrets"),
            ("StatefulSet", "statefulsets"),
            ("Gateway", "gateways"),
            ("Proxy", "proxies"),
            ("Status", "statuses"),
        ];
        for (kind, resource) in cases {
            assert_eq!(kind_to_resource(kind), resource, "kind {}", kind);
        }
    }

    #[test]
    fn test_english_rules() {
        assert_eq!(pluralize("box"), "boxes");
        assert_eq!(pluralize("match"), "matches");
        assert_eq!(pluralize("quiz"), "quizzes");
        assert_eq!(pluralize("index"), "indices");
        assert_eq!(pluralize("knife"), "knives");
        assert_eq!(pluralize("wolf"), "wolves");
        assert_eq!(pluralize("analysis"), "analyses");
        assert_eq!(pluralize("alias"), "aliases");
        assert_eq!(pluralize("hero"), "heroes");
        assert_eq!(pluralize("photo"), "photos");
        assert_eq!(pluralize("key"), "keys");
    }

    #[test]
    fn test_irregular_and_uncountable() {
        assert_eq!(pluralize("person"), "people");
        assert_eq!(pluralize("child"), "children");
        assert_eq!(pluralize("sheep"), "sheep");
        assert_eq!(pluralize("series"), "series");
        assert_eq!(pluralize(""), "");
    }
}
