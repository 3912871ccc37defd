//! Applies templates to foreign labels.

use crate::template::{KeywordRule, TranslationTemplate};
use cube_common::{CubeError, Result};
use label::{Container, Keyword, Traverse, Value};
use tracing::debug;

/// Builds cube label groups from a foreign label.
pub struct Translator;

impl Translator {
    /// Translate `source` with `template`. Groups that end up with no
    /// keywords are left out.
    pub fn translate(source: &Container, template: &TranslationTemplate) -> Result<Vec<Container>> {
        let mut groups = Vec::new();
        for rule in &template.groups {
            let mut group = Container::new(&rule.name);
            for keyword_rule in &rule.keywords {
                if let Some(keyword) = translate_keyword(source, keyword_rule)? {
                    group.add_keyword(keyword);
                }
            }
            if group.is_empty() {
                debug!(template = %template.name, group = %rule.name, "No keywords translated");
                continue;
            }
            groups.push(group);
        }
        Ok(groups)
    }

    /// Merge translated groups into the `IsisCube` object of a cube label.
    pub fn write_groups(label: &mut Container, groups: &[Container]) -> Result<()> {
        let cube = label.object_mut("IsisCube", Traverse::CurrentLevel)?;
        for group in groups {
            match cube.group_mut(&group.name, Traverse::CurrentLevel) {
                Ok(existing) => existing.merge_from(group),
                Err(_) => cube.add_group(group.clone()),
            }
        }
        Ok(())
    }
}

fn find_input<'a>(source: &'a Container, rule: &KeywordRule) -> Option<&'a Keyword> {
    let Some(positions) = &rule.input_position else {
        return source.keyword(&rule.input_key, Traverse::DepthFirst).ok();
    };
    positions.iter().find_map(|path| {
        let mut container = source;
        for name in path {
            container = container
                .object(name, Traverse::CurrentLevel)
                .or_else(|_| container.group(name, Traverse::CurrentLevel))
                .ok()?;
        }
        container.keyword(&rule.input_key, Traverse::CurrentLevel).ok()
    })
}

fn translate_keyword(source: &Container, rule: &KeywordRule) -> Result<Option<Keyword>> {
    let inputs: Vec<Value> = match find_input(source, rule) {
        Some(keyword) => match rule.value_index {
            Some(i) => vec![keyword
                .values
                .get(i)
                .cloned()
                .ok_or_else(|| {
                    CubeError::user(format!(
                        "keyword {} has no value at index {}",
                        rule.input_key, i
                    ))
                })?],
            None => keyword.values.clone(),
        },
        None => match &rule.default {
            Some(default) => vec![Value::new(default.clone())],
            None if rule.required => {
                return Err(CubeError::user(format!(
                    "required keyword {} not found in the input label",
                    rule.input_key
                )))
            }
            None => return Ok(None),
        },
    };

    let mut keyword = Keyword::empty(&rule.output);
    for input in inputs {
        let text = rule.translate_value(&input.text)?;
        let unit = rule.unit.clone().or(input.unit);
        keyword.add_value(Value {
            text,
            unit,
            quoted: false,
        });
    }
    Ok(Some(keyword))
}
