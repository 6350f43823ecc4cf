//! Brand trigger and allow-list policy.

use adreel_models::RuleSet;

use crate::error::{PipelineError, PipelineResult};

/// Which brands may be reported, and when a brand pass runs at all.
#[derive(Debug, Clone, Default)]
pub struct BrandPolicy {
    allow_list: Vec<String>,
    triggers: Vec<String>,
}

impl BrandPolicy {
    pub fn new(allow_list: Vec<String>, triggers: Vec<String>) -> PipelineResult<Self> {
        let clean = |list: Vec<String>| -> Vec<String> {
            list.into_iter()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        };
        let allow_list = clean(allow_list);
        let triggers = clean(triggers);

        if !triggers.is_empty() && allow_list.is_empty() {
            return Err(PipelineError::configuration(
                "brand trigger keywords are configured but the brand allow-list is empty",
            ));
        }
        Ok(Self {
            allow_list,
            triggers,
        })
    }

    pub fn from_rules(rules: &RuleSet) -> PipelineResult<Self> {
        Self::new(
            rules.brand_allow_list.clone(),
            rules.brand_trigger_keywords.clone(),
        )
    }

    pub fn allow_list(&self) -> &[String] {
        &self.allow_list
    }

    pub fn has_triggers(&self) -> bool {
        !self.triggers.is_empty()
    }

    /// Whether `text` mentions any trigger keyword.
    pub fn is_triggered(&self, text: &str) -> bool {
        let text = text.to_lowercase();
        self.triggers
            .iter()
            .any(|t| text.contains(&t.to_lowercase()))
    }

    /// Canonical allow-list name for a detected brand token.
    pub fn canonical(&self, token: &str) -> Option<&str> {
        let token = token.trim().to_lowercase();
        if token.is_empty() {
            return None;
        }
        self.allow_list
            .iter()
            .find(|b| {
                let b = b.to_lowercase();
                token == b || token.contains(&b)
            })
            .map(String::as_str)
    }

    /// Keep only allow-listed brands, mapped to their canonical names.
    pub fn filter<'a, I>(&self, tokens: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a String>,
    {
        let mut out: Vec<String> = Vec::new();
        for token in tokens {
            if let Some(name) = self.canonical(token) {
                if !out.iter().any(|o| o == name) {
                    out.push(name.to_string());
                }
            }
        }
        out
    }

    /// Allow-listed brands mentioned anywhere in `text`.
    pub fn scan_text(&self, text: &str) -> Vec<String> {
        let text = text.to_lowercase();
        self.allow_list
            .iter()
            .filter(|b| text.contains(&b.to_lowercase()))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> BrandPolicy {
        BrandPolicy::new(
            vec!["贝因美".to_string(), "Aptamil".to_string()],
            vec!["奶粉".to_string(), "配方".to_string()],
        )
        .unwrap()
    }

    #[test]
    fn test_triggers_without_allow_list_is_config_error() {
        let err = BrandPolicy::new(vec![], vec!["奶粉".to_string()]).unwrap_err();
        assert!(matches!(err, PipelineError::Configuration(_)));
        assert!(BrandPolicy::new(vec![], vec![]).is_ok());
    }

    #[test]
    fn test_trigger_detection() {
        let p = policy();
        assert!(p.is_triggered("奶粉罐 客厅"));
        assert!(!p.is_triggered("婴儿车 公园"));
    }

    #[test]
    fn test_filter_maps_to_canonical_and_drops_unknown() {
        let p = policy();
        let tokens = vec![
            "贝因美奶粉".to_string(),
            "aptamil".to_string(),
            "飞鹤".to_string(),
            "贝因美".to_string(),
        ];
        assert_eq!(p.filter(&tokens), vec!["贝因美", "Aptamil"]);
    }

    #[test]
    fn test_scan_text() {
        let p = policy();
        assert_eq!(p.scan_text("我一直给宝宝喝贝因美"), vec!["贝因美"]);
        assert!(p.scan_text("随便什么奶粉").is_empty());
    }
}
