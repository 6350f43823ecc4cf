//! Narrative modules a segment can be assigned to.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Fixed marketing narrative stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Module {
    /// Problem statement (痛点).
    PainPoint,
    /// Solution introduction (解决方案导入).
    SolutionIntro,
    /// Selling point, ingredients and formula (卖点·成分&配方).
    SellingPoint,
    /// Promotion mechanics (促销机制).
    Promotion,
    /// Anything that matched no module.
    Other,
}

impl Module {
    /// Composition order of the real modules.
    pub const ORDERED: [Module; 4] = [
        Module::PainPoint,
        Module::SolutionIntro,
        Module::SellingPoint,
        Module::Promotion,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Module::PainPoint => "pain_point",
            Module::SolutionIntro => "solution_intro",
            Module::SellingPoint => "selling_point",
            Module::Promotion => "promotion",
            Module::Other => "other",
        }
    }

    /// Name used in rule files, AI prompts and reports.
    pub fn canonical_name(&self) -> &'static str {
        match self {
            Module::PainPoint => "痛点",
            Module::SolutionIntro => "解决方案导入",
            Module::SellingPoint => "卖点·成分&配方",
            Module::Promotion => "促销机制",
            Module::Other => "其他",
        }
    }

    /// Short forms accepted when normalizing free-text replies.
    pub fn aliases(&self) -> &'static [&'static str] {
        match self {
            Module::PainPoint => &["痛点", "pain point", "pain_point", "problem"],
            Module::SolutionIntro => &["解决方案", "方案导入", "solution"],
            Module::SellingPoint => &["卖点", "成分", "配方", "selling point", "selling_point"],
            Module::Promotion => &["促销", "优惠", "promotion"],
            Module::Other => &["其他", "other"],
        }
    }

    /// Position in [`Module::ORDERED`], `None` for [`Module::Other`].
    pub fn order_index(&self) -> Option<usize> {
        Module::ORDERED.iter().position(|m| m == self)
    }

    /// Normalize a free-text module reply.
    ///
    /// Canonical names are tried before aliases so that a reply such as
    /// "解决方案导入" never resolves through a shorter alias of another module.
    pub fn from_reply(reply: &str) -> Option<Module> {
        let text = reply.trim().to_lowercase();
        if text.is_empty() {
            return None;
        }

        let all = [
            Module::PainPoint,
            Module::SolutionIntro,
            Module::SellingPoint,
            Module::Promotion,
            Module::Other,
        ];

        if let Some(m) = all.iter().find(|m| text.contains(m.canonical_name())) {
            return Some(*m);
        }

        all.iter()
            .find(|m| m.aliases().iter().any(|a| text.contains(&a.to_lowercase())))
            .copied()
    }

    /// Parse a canonical name or snake_case identifier.
    pub fn from_name(name: &str) -> Option<Module> {
        let name = name.trim();
        [
            Module::PainPoint,
            Module::SolutionIntro,
            Module::SellingPoint,
            Module::Promotion,
            Module::Other,
        ]
        .into_iter()
        .find(|m| m.canonical_name() == name || m.as_str() == name)
    }
}

impl std::fmt::Display for Module {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.canonical_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_reply_canonical() {
        assert_eq!(Module::from_reply("痛点"), Some(Module::PainPoint));
        assert_eq!(Module::from_reply(" 解决方案导入 "), Some(Module::SolutionIntro));
        assert_eq!(Module::from_reply("卖点·成分&配方"), Some(Module::SellingPoint));
        assert_eq!(Module::from_reply("答案：促销机制"), Some(Module::Promotion));
    }

    #[test]
    fn test_from_reply_aliases() {
        assert_eq!(Module::from_reply("卖点"), Some(Module::SellingPoint));
        assert_eq!(Module::from_reply("Promotion"), Some(Module::Promotion));
        assert_eq!(Module::from_reply("其他"), Some(Module::Other));
    }

    #[test]
    fn test_from_reply_no_match() {
        assert_eq!(Module::from_reply(""), None);
        assert_eq!(Module::from_reply("I cannot tell"), None);
    }

    #[test]
    fn test_from_name() {
        assert_eq!(Module::from_name("promotion"), Some(Module::Promotion));
        assert_eq!(Module::from_name("痛点"), Some(Module::PainPoint));
        assert_eq!(Module::from_name("卖点"), None);
    }

    #[test]
    fn test_order_index() {
        assert_eq!(Module::PainPoint.order_index(), Some(0));
        assert_eq!(Module::Promotion.order_index(), Some(3));
        assert_eq!(Module::Other.order_index(), None);
    }
}
