use std::fmt;

use regex::{Regex, RegexBuilder};

use crate::config::{ClassifierConfig, ClassifierStrategy};
use crate::record::Record;

/// A routing label: one of the configured categories or the default.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Category(String);

impl Category {
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What the classifier looks at.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClassificationSubject<'a> {
    pub title: Option<&'a str>,
    pub record: Option<&'a Record>,
}

impl<'a> ClassificationSubject<'a> {
    pub fn from_title(title: &'a str) -> Self {
        Self {
            title: Some(title),
            record: None,
        }
    }

    pub fn with_record(mut self, record: &'a Record) -> Self {
        self.record = Some(record);
        self
    }
}

struct CompiledRule {
    category: Category,
    /// Lowercased once so matching is a plain substring search.
    keywords: Vec<String>,
    pattern: Option<Regex>,
}

impl CompiledRule {
    fn matches(&self, lowered_title: &str, title: &str) -> bool {
        self.keywords
            .iter()
            .any(|k| !k.is_empty() && lowered_title.contains(k.as_str()))
            || self.pattern.as_ref().is_some_and(|re| re.is_match(title))
    }
}

/// Maps a document to a category. Pure: same subject, same answer.
pub struct Classifier {
    strategy: ClassifierStrategy,
    rules: Vec<CompiledRule>,
    field: Option<String>,
    categories: Vec<Category>,
    default: Category,
}

impl Classifier {
    pub fn new(config: &ClassifierConfig) -> Self {
        let rules = config
            .keywords
            .iter()
            .map(|rule| CompiledRule {
                category: Category::new(&rule.category),
                keywords: rule.keywords.iter().map(|k| k.to_lowercase()).collect(),
                // patterns are validated at config load
                pattern: rule.pattern.as_ref().and_then(|p| {
                    RegexBuilder::new(p).case_insensitive(true).build().ok()
                }),
            })
            .collect();

        Self {
            strategy: config.strategy,
            rules,
            field: config.field.clone(),
            categories: config.categories.iter().map(Category::new).collect(),
            default: Category::new(&config.default_category),
        }
    }

    pub fn default_category(&self) -> &Category {
        &self.default
    }

    pub fn classify(&self, subject: &ClassificationSubject<'_>) -> Category {
        let category = match self.strategy {
            ClassifierStrategy::Keyword => subject.title.and_then(|t| self.by_keyword(t)),
            ClassifierStrategy::Field => self.by_field(subject),
        };
        category.unwrap_or_else(|| self.default.clone())
    }

    /// Canonical category for a caller-supplied label, if it is known.
    pub fn resolve(&self, label: &str) -> Option<Category> {
        let wanted = label.trim().to_lowercase();
        if wanted.is_empty() {
            return None;
        }
        self.categories
            .iter()
            .chain(std::iter::once(&self.default))
            .find(|c| c.as_str().to_lowercase() == wanted)
            .cloned()
    }

    fn by_keyword(&self, title: &str) -> Option<Category> {
        let lowered = title.to_lowercase();
        self.rules
            .iter()
            .find(|rule| rule.matches(&lowered, title))
            .map(|rule| rule.category.clone())
    }

    fn by_field(&self, subject: &ClassificationSubject<'_>) -> Option<Category> {
        let field = self.field.as_deref()?;
        let value = subject.record?.text(field)?;
        self.resolve(value)
    }
}
