//! Per-language phrase tables.
//!
//! A `LanguagePack` holds a word table (connector words and class names) and
//! templates for each narration register. Templates reference words with
//! `{key}` placeholders; `{class}`, `{Class}`, `{CLASS}` and `{texts}` are
//! bound by the caller. Lookups fall back from the requested language to the
//! default language, and from there to the raw key, so an unlisted class or an
//! unknown language degrades to plain text instead of failing.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

use crate::narrate::language::Language;
use crate::narrate::policy::{normalize_class, ClassCategory};

const BUILTIN_PHRASES: &str = include_str!("phrases.json");
const GENERIC: &str = "generic";

/// Tone of the primary object phrase.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Register {
    /// Critical or very close hazard.
    Alarm,
    Neutral,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LanguagePack {
    #[serde(default)]
    pub words: HashMap<String, String>,
    /// Alarm-register templates keyed by class name or class category.
    #[serde(default)]
    pub alarm: HashMap<String, String>,
    /// Neutral-register templates keyed by class name or class category.
    #[serde(default)]
    pub neutral: HashMap<String, String>,
    #[serde(default)]
    pub also_detected: Option<String>,
    /// Lead-in for safety signage.
    #[serde(default)]
    pub sign: Option<String>,
    /// Lead-in for other text.
    #[serde(default)]
    pub text: Option<String>,
}

impl LanguagePack {
    fn register(&self, register: Register) -> &HashMap<String, String> {
        match register {
            Register::Alarm => &self.alarm,
            Register::Neutral => &self.neutral,
        }
    }

    fn merge(&mut self, other: LanguagePack) {
        self.words.extend(other.words);
        self.alarm.extend(other.alarm);
        self.neutral.extend(other.neutral);
        if other.also_detected.is_some() {
            self.also_detected = other.also_detected;
        }
        if other.sign.is_some() {
            self.sign = other.sign;
        }
        if other.text.is_some() {
            self.text = other.text;
        }
    }
}

#[derive(Clone, Debug)]
pub struct PhraseBook {
    packs: HashMap<Language, LanguagePack>,
    default_language: Language,
}

impl PhraseBook {
    /// English and Hindi packs compiled into the binary.
    pub fn builtin() -> Result<Self> {
        Self::from_json(BUILTIN_PHRASES)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let packs = parse_packs(raw)?;
        let default_language = Language::english();
        let default_pack = packs
            .get(&default_language)
            .ok_or_else(|| anyhow!("phrase table is missing the default language '{}'", default_language))?;
        for (name, present) in [
            ("alarm.generic", default_pack.alarm.contains_key(GENERIC)),
            ("neutral.generic", default_pack.neutral.contains_key(GENERIC)),
            ("also_detected", default_pack.also_detected.is_some()),
            ("sign", default_pack.sign.is_some()),
            ("text", default_pack.text.is_some()),
        ] {
            if !present {
                return Err(anyhow!(
                    "default language '{}' must define template {}",
                    default_language,
                    name
                ));
            }
        }
        Ok(Self {
            packs,
            default_language,
        })
    }

    /// Merge extra or overriding packs from a JSON file.
    pub fn merge_from(&mut self, path: &Path) -> Result<()> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow!("failed to read phrase table {}: {}", path.display(), e))?;
        let packs = parse_packs(&raw)
            .map_err(|e| anyhow!("invalid phrase table {}: {}", path.display(), e))?;
        for (language, pack) in packs {
            self.packs.entry(language).or_default().merge(pack);
        }
        Ok(())
    }

    pub fn default_language(&self) -> &Language {
        &self.default_language
    }

    pub fn has_language(&self, language: &Language) -> bool {
        self.packs.contains_key(language)
    }

    pub fn languages(&self) -> Vec<String> {
        let mut codes: Vec<String> = self.packs.keys().map(|l| l.code().to_string()).collect();
        codes.sort();
        codes
    }

    /// Look up a word; falls back to the default language, then to `key`.
    pub fn translate(&self, key: &str, language: &Language) -> String {
        self.lookup(language, |pack| pack.words.get(key))
            .unwrap_or(key)
            .to_string()
    }

    /// Phrase for the primary detection. A template keyed by the class name
    /// wins over the category template.
    pub fn object_phrase(
        &self,
        register: Register,
        category: ClassCategory,
        class_name: &str,
        language: &Language,
    ) -> String {
        let class_key = normalize_class(class_name);
        let template = self
            .lookup(language, |pack| {
                let table = pack.register(register);
                table
                    .get(class_key.as_str())
                    .or_else(|| table.get(category.key()))
                    .or_else(|| table.get(GENERIC))
            })
            .unwrap_or("{Class}");
        self.render_with_class(template, class_name, language)
    }

    /// Short addendum for a secondary detection.
    pub fn also_detected(&self, class_name: &str, language: &Language) -> String {
        let template = self
            .lookup(language, |pack| pack.also_detected.as_ref())
            .unwrap_or("{class}");
        self.render_with_class(template, class_name, language)
    }

    /// Sentence announcing recognized text.
    pub fn text_phrase(&self, texts: &str, signage: bool, language: &Language) -> String {
        let template = self
            .lookup(language, |pack| {
                if signage {
                    pack.sign.as_ref()
                } else {
                    pack.text.as_ref()
                }
            })
            .unwrap_or("{texts}");
        self.render(template, language, &[("texts", texts.to_string())])
    }

    fn lookup<'a, F>(&'a self, language: &Language, select: F) -> Option<&'a str>
    where
        F: Fn(&'a LanguagePack) -> Option<&'a String>,
    {
        self.packs
            .get(language)
            .and_then(&select)
            .or_else(|| self.packs.get(&self.default_language).and_then(&select))
            .map(String::as_str)
    }

    fn render_with_class(&self, template: &str, class_name: &str, language: &Language) -> String {
        let class = self.translate(&normalize_class(class_name), language);
        let vars = [
            ("Class", capitalize(&class)),
            ("CLASS", class.to_uppercase()),
            ("class", class),
        ];
        self.render(template, language, &vars)
    }

    fn render(&self, template: &str, language: &Language, vars: &[(&str, String)]) -> String {
        let mut out = String::with_capacity(template.len() + 16);
        let mut rest = template;
        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            let Some(close) = after.find('}') else {
                out.push_str(&rest[open..]);
                return out;
            };
            let key = &after[..close];
            match vars.iter().find(|(name, _)| *name == key) {
                Some((_, value)) => out.push_str(value),
                None => out.push_str(&self.translate(key, language)),
            }
            rest = &after[close + 1..];
        }
        out.push_str(rest);
        out
    }
}

fn parse_packs(raw: &str) -> Result<HashMap<Language, LanguagePack>> {
    let packs: HashMap<String, LanguagePack> = serde_json::from_str(raw)?;
    packs
        .into_iter()
        .map(|(code, pack)| Ok((Language::parse(&code)?, pack)))
        .collect()
}

/// First character upper-case, the rest lower-case.
fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn en() -> Language {
        Language::english()
    }

    fn hi() -> Language {
        Language::parse("hi").unwrap()
    }

    #[test]
    fn builtin_tables_load() {
        let book = PhraseBook::builtin().unwrap();
        assert_eq!(book.languages(), vec!["en", "hi"]);
    }

    #[test]
    fn translate_falls_back_to_raw_key() {
        let book = PhraseBook::builtin().unwrap();
        assert_eq!(book.translate("door", &hi()), "दरवाज़ा");
        assert_eq!(book.translate("hovercraft", &hi()), "hovercraft");
        assert_eq!(book.translate("ahead", &Language::parse("fr").unwrap()), "ahead");
    }

    #[test]
    fn class_forms_render() {
        let book = PhraseBook::builtin().unwrap();
        assert_eq!(
            book.object_phrase(Register::Alarm, ClassCategory::Vehicle, "bus", &en()),
            "WARNING! BUS DETECTED!"
        );
        assert_eq!(
            book.object_phrase(Register::Neutral, ClassCategory::Generic, "stop sign", &en()),
            "Stop sign ahead"
        );
        assert_eq!(
            book.object_phrase(Register::Neutral, ClassCategory::Stairs, "stairs", &hi()),
            "सीढ़ियाँ सामने"
        );
    }

    #[test]
    fn class_template_overrides_category() {
        let book = PhraseBook::builtin().unwrap();
        assert_eq!(
            book.object_phrase(Register::Neutral, ClassCategory::Furniture, "bench", &en()),
            "Bench detected"
        );
        assert_eq!(
            book.object_phrase(Register::Neutral, ClassCategory::Furniture, "bench", &hi()),
            "बेंच सामने"
        );
        assert_eq!(
            book.object_phrase(Register::Neutral, ClassCategory::Furniture, "chair", &hi()),
            "कुर्सी का पता चला"
        );
    }

    #[test]
    fn unclosed_placeholder_is_literal() {
        let book = PhraseBook::builtin().unwrap();
        assert_eq!(book.render("Look {ahead", &en(), &[]), "Look {ahead");
    }

    #[test]
    fn merged_pack_adds_language() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("es.json");
        std::fs::write(
            &path,
            r#"{"es": {"words": {"ahead": "adelante", "person": "persona"},
                        "neutral": {"generic": "{Class} {ahead}"}}}"#,
        )
        .unwrap();
        let mut book = PhraseBook::builtin().unwrap();
        book.merge_from(&path).unwrap();
        let es = Language::parse("es").unwrap();
        assert!(book.has_language(&es));
        assert_eq!(
            book.object_phrase(Register::Neutral, ClassCategory::Person, "person", &es),
            "Persona adelante"
        );
        // templates missing from the pack come from the default language
        assert_eq!(book.also_detected("person", &es), "persona detected");
    }

    #[test]
    fn default_language_is_required() {
        assert!(PhraseBook::from_json(r#"{"hi": {}}"#).is_err());
    }
}
