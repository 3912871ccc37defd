//! Label translation: YAML templates that map foreign label keywords onto
//! cube label groups.

pub mod store;
pub mod template;
pub mod translator;

pub use store::{TemplateSource, TemplateStore};
pub use template::{wildcard_match, GroupRule, KeywordRule, TranslationTemplate};
pub use translator::Translator;
