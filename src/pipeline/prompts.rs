use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context};

use crate::error::TemplateError;

pub const DEFAULT_PROMPTS_DIR: &str = "prompts";

/// Every template the pipeline renders. Single-unit and chunked variants differ
/// in how the span to translate is presented to the model.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PromptId {
    SingleInitialSystem,
    SingleInitial,
    SingleReflectSystem,
    SingleReflect,
    SingleReflectCountry,
    SingleImproveSystem,
    SingleImprove,
    MultiInitialSystem,
    MultiInitial,
    MultiReflectSystem,
    MultiReflect,
    MultiReflectCountry,
    MultiImproveSystem,
    MultiImprove,
}

impl PromptId {
    pub const ALL: [PromptId; 14] = [
        Self::SingleInitialSystem,
        Self::SingleInitial,
        Self::SingleReflectSystem,
        Self::SingleReflect,
        Self::SingleReflectCountry,
        Self::SingleImproveSystem,
        Self::SingleImprove,
        Self::MultiInitialSystem,
        Self::MultiInitial,
        Self::MultiReflectSystem,
        Self::MultiReflect,
        Self::MultiReflectCountry,
        Self::MultiImproveSystem,
        Self::MultiImprove,
    ];

    /// Key used in the `[prompts]` config table.
    pub fn key(self) -> &'static str {
        match self {
            Self::SingleInitialSystem => "single_initial_system",
            Self::SingleInitial => "single_initial",
            Self::SingleReflectSystem => "single_reflect_system",
            Self::SingleReflect => "single_reflect",
            Self::SingleReflectCountry => "single_reflect_country",
            Self::SingleImproveSystem => "single_improve_system",
            Self::SingleImprove => "single_improve",
            Self::MultiInitialSystem => "multi_initial_system",
            Self::MultiInitial => "multi_initial",
            Self::MultiReflectSystem => "multi_reflect_system",
            Self::MultiReflect => "multi_reflect",
            Self::MultiReflectCountry => "multi_reflect_country",
            Self::MultiImproveSystem => "multi_improve_system",
            Self::MultiImprove => "multi_improve",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|id| id.key() == key.trim())
    }

    pub fn default_file_name(self) -> String {
        format!("{}.txt", self.key())
    }

    pub fn default_text(self) -> &'static str {
        match self {
            Self::SingleInitialSystem | Self::MultiInitialSystem => INITIAL_SYSTEM_TEXT,
            Self::SingleReflectSystem | Self::MultiReflectSystem => REFLECT_SYSTEM_TEXT,
            Self::SingleImproveSystem | Self::MultiImproveSystem => IMPROVE_SYSTEM_TEXT,
            Self::SingleInitial => SINGLE_INITIAL_TEXT,
            Self::SingleReflect => SINGLE_REFLECT_TEXT,
            Self::SingleReflectCountry => SINGLE_REFLECT_COUNTRY_TEXT,
            Self::SingleImprove => SINGLE_IMPROVE_TEXT,
            Self::MultiInitial => MULTI_INITIAL_TEXT,
            Self::MultiReflect => MULTI_REFLECT_TEXT,
            Self::MultiReflectCountry => MULTI_REFLECT_COUNTRY_TEXT,
            Self::MultiImprove => MULTI_IMPROVE_TEXT,
        }
    }
}

#[derive(Clone, Debug)]
pub struct PromptSet {
    templates: BTreeMap<PromptId, String>,
}

impl Default for PromptSet {
    fn default() -> Self {
        Self {
            templates: PromptId::ALL
                .into_iter()
                .map(|id| (id, id.default_text().to_string()))
                .collect(),
        }
    }
}

impl PromptSet {
    /// Built-in templates, replaced by any file listed in `overrides`
    /// (`key -> path`, relative paths resolved against `config_dir`).
    pub fn load(config_dir: &Path, overrides: &BTreeMap<String, String>) -> anyhow::Result<Self> {
        let mut set = Self::default();
        for (key, path) in overrides {
            let id = PromptId::from_key(key).ok_or_else(|| anyhow!("unknown prompt key: {key}"))?;
            let text = read_prompt(config_dir, key, path)?;
            set.templates.insert(id, text);
        }
        Ok(set)
    }

    #[must_use]
    pub fn with_template(mut self, id: PromptId, text: impl Into<String>) -> Self {
        self.templates.insert(id, text.into());
        self
    }

    pub fn template(&self, id: PromptId) -> &str {
        self.templates
            .get(&id)
            .map(String::as_str)
            .unwrap_or_else(|| id.default_text())
    }

    pub fn render(&self, id: PromptId, vars: &[(&str, &str)]) -> Result<String, TemplateError> {
        render_template(id.key(), self.template(id), vars)
    }
}

fn read_prompt(config_dir: &Path, key: &str, path: &str) -> anyhow::Result<String> {
    let mut p = PathBuf::from(path.trim());
    if p.is_relative() {
        p = config_dir.join(&p);
    }
    if !p.exists() {
        return Err(anyhow!(
            "prompt file not found for {key}: {} (run: translation-agent --init-config)",
            p.display()
        ));
    }
    std::fs::read_to_string(&p).with_context(|| format!("read prompt: {}", p.display()))
}

/// Substitutes `{{name}}` placeholders in one pass. Substituted values are never
/// re-scanned, so source text containing braces is safe.
pub fn render_template(
    name: &str,
    template: &str,
    vars: &[(&str, &str)],
) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    let mut offset = 0usize;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after.find("}}").ok_or_else(|| TemplateError::Unterminated {
            template: name.to_string(),
            offset: offset + start,
        })?;
        let key = after[..end].trim();
        let value = vars
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| *v)
            .ok_or_else(|| TemplateError::MissingVariable {
                template: name.to_string(),
                name: key.to_string(),
            })?;
        out.push_str(value);
        let consumed = start + 2 + end + 2;
        offset += consumed;
        rest = &rest[consumed..];
    }
    out.push_str(rest);
    Ok(out)
}

pub fn default_prompt_files() -> Vec<(String, &'static str)> {
    PromptId::ALL
        .into_iter()
        .map(|id| (id.default_file_name(), id.default_text()))
        .collect()
}

pub const INITIAL_SYSTEM_TEXT: &str =
    "You are an expert linguist, specializing in translation from {{source_lang}} to {{target_lang}}.";

pub const REFLECT_SYSTEM_TEXT: &str = r#"You are an expert linguist specializing in translation from {{source_lang}} to {{target_lang}}.
You will be provided with a source text and its translation and your goal is to improve the translation."#;

pub const IMPROVE_SYSTEM_TEXT: &str =
    "You are an expert linguist, specializing in translation editing from {{source_lang}} to {{target_lang}}.";

pub const SINGLE_INITIAL_TEXT: &str = r#"This is an {{source_lang}} to {{target_lang}} translation, please provide the {{target_lang}} translation for this text.
Do not provide any explanations or text apart from the translation.
{{source_lang}}: {{source_text}}

{{target_lang}}:"#;

pub const SINGLE_REFLECT_TEXT: &str = r#"Your task is to carefully read a source text and a translation from {{source_lang}} to {{target_lang}}, and then give constructive criticisms and helpful suggestions to improve the translation.

The source text and initial translation, delimited by XML tags <SOURCE_TEXT></SOURCE_TEXT> and <TRANSLATION></TRANSLATION>, are as follows:

<SOURCE_TEXT>
{{source_text}}
</SOURCE_TEXT>

<TRANSLATION>
{{translation_1}}
</TRANSLATION>

When writing suggestions, pay attention to whether there are ways to improve the translation's
(i) accuracy (by correcting errors of addition, mistranslation, omission, or untranslated text),
(ii) fluency (by applying {{target_lang}} grammar, spelling and punctuation rules, and ensuring there are no unnecessary repetitions),
(iii) style (by ensuring the translations reflect the style of the source text and take into account any cultural context),
(iv) terminology (by ensuring terminology use is consistent and reflects the source text domain; and by only ensuring you use equivalent idioms {{target_lang}}).

Write a list of specific, helpful and constructive suggestions for improving the translation.
Each suggestion should address one specific part of the translation.
Output only the suggestions and nothing else."#;

pub const SINGLE_REFLECT_COUNTRY_TEXT: &str = r#"Your task is to carefully read a source text and a translation from {{source_lang}} to {{target_lang}}, and then give constructive criticism and helpful suggestions to improve the translation.
The final style and tone of the translation should match the style of {{target_lang}} colloquially spoken in {{country}}.

The source text and initial translation, delimited by XML tags <SOURCE_TEXT></SOURCE_TEXT> and <TRANSLATION></TRANSLATION>, are as follows:

<SOURCE_TEXT>
{{source_text}}
</SOURCE_TEXT>

<TRANSLATION>
{{translation_1}}
</TRANSLATION>

When writing suggestions, pay attention to whether there are ways to improve the translation's
(i) accuracy (by correcting errors of addition, mistranslation, omission, or untranslated text),
(ii) fluency (by applying {{target_lang}} grammar, spelling and punctuation rules, and ensuring there are no unnecessary repetitions),
(iii) style (by ensuring the translations reflect the style of the source text and take into account any cultural context),
(iv) terminology (by ensuring terminology use is consistent and reflects the source text domain; and by only ensuring you use equivalent idioms {{target_lang}}).

Write a list of specific, helpful and constructive suggestions for improving the translation.
Each suggestion should address one specific part of the translation.
Output only the suggestions and nothing else."#;

pub const SINGLE_IMPROVE_TEXT: &str = r#"Your task is to carefully read, then edit, a translation from {{source_lang}} to {{target_lang}}, taking into
account a list of expert suggestions and constructive criticisms.

The source text, the initial translation, and the expert linguist suggestions are delimited by XML tags <SOURCE_TEXT></SOURCE_TEXT>, <TRANSLATION></TRANSLATION> and <EXPERT_SUGGESTIONS></EXPERT_SUGGESTIONS>
as follows:

<SOURCE_TEXT>
{{source_text}}
</SOURCE_TEXT>

<TRANSLATION>
{{translation_1}}
</TRANSLATION>

<EXPERT_SUGGESTIONS>
{{reflection}}
</EXPERT_SUGGESTIONS>

Please take into account the expert suggestions when editing the translation. Edit the translation by ensuring:

(i) accuracy (by correcting errors of addition, mistranslation, omission, or untranslated text),
(ii) fluency (by applying {{target_lang}} grammar, spelling and punctuation rules and ensuring there are no unnecessary repetitions),
(iii) style (by ensuring the translations reflect the style of the source text)
(iv) terminology (inappropriate for context, inconsistent use), or
(v) other errors.

Output only the new translation and nothing else."#;

pub const MULTI_INITIAL_TEXT: &str = r#"Your task is to provide a professional translation from {{source_lang}} to {{target_lang}} of PART of a text.

The source text is below, delimited by XML tags <SOURCE_TEXT> and </SOURCE_TEXT>. Translate only the part within the source text
delimited by <TRANSLATE_THIS> and </TRANSLATE_THIS>. You can use the rest of the source text as context, but do not translate any
of the other text. Do not output anything other than the translation of the indicated part of the text.

<SOURCE_TEXT>
{{tagged_text}}
</SOURCE_TEXT>

To reiterate, you should translate only this part of the text, shown here again between <TRANSLATE_THIS> and </TRANSLATE_THIS>:
<TRANSLATE_THIS>
{{chunk_to_translate}}
</TRANSLATE_THIS>

Output only the translation of the portion you are asked to translate, and nothing else."#;

pub const MULTI_REFLECT_TEXT: &str = r#"Your task is to carefully read a source text and part of a translation of that text from {{source_lang}} to {{target_lang}}, and then give constructive criticism and helpful suggestions for improving the translation.

The source text is below, delimited by XML tags <SOURCE_TEXT> and </SOURCE_TEXT>, and the part that has been translated
is delimited by <TRANSLATE_THIS> and </TRANSLATE_THIS> within the source text. You can use the rest of the source text
as context for critiquing the translated part.

<SOURCE_TEXT>
{{tagged_text}}
</SOURCE_TEXT>

To reiterate, only part of the text is being translated, shown here again between <TRANSLATE_THIS> and </TRANSLATE_THIS>:
<TRANSLATE_THIS>
{{chunk_to_translate}}
</TRANSLATE_THIS>

The translation of the indicated part, delimited below by <TRANSLATION> and </TRANSLATION>, is as follows:
<TRANSLATION>
{{translation_1_chunk}}
</TRANSLATION>

When writing suggestions, pay attention to whether there are ways to improve the translation's:
(i) accuracy (by correcting errors of addition, mistranslation, omission, or untranslated text),
(ii) fluency (by applying {{target_lang}} grammar, spelling and punctuation rules, and ensuring there are no unnecessary repetitions),
(iii) style (by ensuring the translations reflect the style of the source text and take into account any cultural context),
(iv) terminology (by ensuring terminology use is consistent and reflects the source text domain; and by only ensuring you use equivalent idioms {{target_lang}}).

Write a list of specific, helpful and constructive suggestions for improving the translation.
Each suggestion should address one specific part of the translation.
Output only the suggestions and nothing else."#;

pub const MULTI_REFLECT_COUNTRY_TEXT: &str = r#"Your task is to carefully read a source text and part of a translation of that text from {{source_lang}} to {{target_lang}}, and then give constructive criticism and helpful suggestions for improving the translation.
The final style and tone of the translation should match the style of {{target_lang}} colloquially spoken in {{country}}.

The source text is below, delimited by XML tags <SOURCE_TEXT> and </SOURCE_TEXT>, and the part that has been translated
is delimited by <TRANSLATE_THIS> and </TRANSLATE_THIS> within the source text. You can use the rest of the source text
as context for critiquing the translated part.

<SOURCE_TEXT>
{{tagged_text}}
</SOURCE_TEXT>

To reiterate, only part of the text is being translated, shown here again between <TRANSLATE_THIS> and </TRANSLATE_THIS>:
<TRANSLATE_THIS>
{{chunk_to_translate}}
</TRANSLATE_THIS>

The translation of the indicated part, delimited below by <TRANSLATION> and </TRANSLATION>, is as follows:
<TRANSLATION>
{{translation_1_chunk}}
</TRANSLATION>

When writing suggestions, pay attention to whether there are ways to improve the translation's:
(i) accuracy (by correcting errors of addition, mistranslation, omission, or untranslated text),
(ii) fluency (by applying {{target_lang}} grammar, spelling and punctuation rules, and ensuring there are no unnecessary repetitions),
(iii) style (by ensuring the translations reflect the style of the source text and take into account any cultural context),
(iv) terminology (by ensuring terminology use is consistent and reflects the source text domain; and by only ensuring you use equivalent idioms {{target_lang}}).

Write a list of specific, helpful and constructive suggestions for improving the translation.
Each suggestion should address one specific part of the translation.
Output only the suggestions and nothing else."#;

pub const MULTI_IMPROVE_TEXT: &str = r#"Your task is to carefully read, then improve, a translation from {{source_lang}} to {{target_lang}}, taking into
account a set of expert suggestions and constructive criticisms. Below, the source text, initial translation, and expert suggestions are provided.

The source text is below, delimited by XML tags <SOURCE_TEXT> and </SOURCE_TEXT>, and the part that has been translated
is delimited by <TRANSLATE_THIS> and </TRANSLATE_THIS> within the source text. You can use the rest of the source text
as context, but need to provide a translation only of the part indicated by <TRANSLATE_THIS> and </TRANSLATE_THIS>.

<SOURCE_TEXT>
{{tagged_text}}
</SOURCE_TEXT>

To reiterate, only part of the text is being translated, shown here again between <TRANSLATE_THIS> and </TRANSLATE_THIS>:
<TRANSLATE_THIS>
{{chunk_to_translate}}
</TRANSLATE_THIS>

The translation of the indicated part, delimited below by <TRANSLATION> and </TRANSLATION>, is as follows:
<TRANSLATION>
{{translation_1_chunk}}
</TRANSLATION>

The expert translations of the indicated part, delimited below by <EXPERT_SUGGESTIONS> and </EXPERT_SUGGESTIONS>, are as follows:
<EXPERT_SUGGESTIONS>
{{reflection_chunk}}
</EXPERT_SUGGESTIONS>

Taking into account the expert suggestions rewrite the translation to improve it, paying attention
to whether there are ways to improve the translation's

(i) accuracy (by correcting errors of addition, mistranslation, omission, or untranslated text),
(ii) fluency (by applying {{target_lang}} grammar, spelling and punctuation rules and ensuring there are no unnecessary repetitions),
(iii) style (by ensuring the translations reflect the style of the source text)
(iv) terminology (inappropriate for context, inconsistent use), or
(v) other errors.

Output only the new translation of the indicated part and nothing else."#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_named_placeholders() {
        let out = render_template(
            "t",
            "{{a}} to {{ b }}, {{a}}!",
            &[("a", "English"), ("b", "Spanish")],
        )
        .unwrap();
        assert_eq!(out, "English to Spanish, English!");
    }

    #[test]
    fn substituted_values_are_not_rescanned() {
        let out = render_template("t", "<{{x}}>", &[("x", "{{y}}")]).unwrap();
        assert_eq!(out, "<{{y}}>");
    }

    #[test]
    fn missing_variable_is_an_error() {
        let err = render_template("single_initial", "{{source_text}}", &[]).unwrap_err();
        match err {
            TemplateError::MissingVariable { template, name } => {
                assert_eq!(template, "single_initial");
                assert_eq!(name, "source_text");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn unterminated_placeholder_is_an_error() {
        let err = render_template("t", "abc {{oops", &[("oops", "x")]).unwrap_err();
        assert!(matches!(err, TemplateError::Unterminated { offset: 4, .. }));
    }

    #[test]
    fn keys_round_trip_and_defaults_render() {
        let set = PromptSet::default();
        let vars = [
            ("source_lang", "English"),
            ("target_lang", "Spanish"),
            ("source_text", "Hello"),
            ("translation_1", "Hola"),
            ("reflection", "ok"),
            ("country", "Mexico"),
            ("tagged_text", "<TRANSLATE_THIS>Hello</TRANSLATE_THIS>"),
            ("chunk_to_translate", "Hello"),
            ("translation_1_chunk", "Hola"),
            ("reflection_chunk", "ok"),
        ];
        for id in PromptId::ALL {
            assert_eq!(PromptId::from_key(id.key()), Some(id));
            let out = set.render(id, &vars).unwrap();
            assert!(!out.contains("{{"), "{id:?}");
        }
        assert!(set
            .render(PromptId::SingleReflectCountry, &vars)
            .unwrap()
            .contains("colloquially spoken in Mexico"));
    }

    #[test]
    fn overrides_are_read_from_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("mine.txt"), "Say {{source_text}}").unwrap();
        let mut overrides = BTreeMap::new();
        overrides.insert("single_initial".to_string(), "mine.txt".to_string());
        let set = PromptSet::load(dir.path(), &overrides).unwrap();
        assert_eq!(
            set.render(PromptId::SingleInitial, &[("source_text", "hi")])
                .unwrap(),
            "Say hi"
        );

        overrides.insert("bogus".to_string(), "mine.txt".to_string());
        assert!(PromptSet::load(dir.path(), &overrides).is_err());
    }
}
