use std::{borrow::Cow, collections::HashMap, str::FromStr, sync::LazyLock};

use fluent_bundle::FluentValue;
use fluent_templates::{LanguageIdentifier, Loader};

fluent_templates::static_loader! {
    static LOCALES = {
        locales: "locales",
        fallback_language: "en-US",
        core_locales: "locales/core.ftl",
    };
}

fn current_lang_id() -> &'static LanguageIdentifier {
    static LANG_ID: LazyLock<LanguageIdentifier> = LazyLock::new(|| {
        let locale_string = sys_locale::get_locale().unwrap_or_else(|| "en-US".to_string());

        match LanguageIdentifier::from_str(&locale_string) {
            Ok(value) => value,
            Err(_) => fluent_templates::langid!("en-US"),
        }
    });

    &LANG_ID
}

/// BCP 47 tag of the system language.
pub fn current_lang_tag() -> String {
    current_lang_id().to_string()
}

/// Looks up user interface text in one language.
pub struct Locale {
    lang_id: LanguageIdentifier,
}

impl Locale {
    pub fn with_system() -> Self {
        Self {
            lang_id: current_lang_id().clone(),
        }
    }

    pub fn set_language_tag(&mut self, value: &str) {
        self.lang_id = match LanguageIdentifier::from_str(value) {
            Ok(value) => value,
            Err(_) => fluent_templates::langid!("en-US"),
        };
    }

    pub fn text(&self, text_id: &str) -> String {
        LOCALES.lookup(&self.lang_id, text_id)
    }

    pub fn text_args<'a, A>(&self, text_id: &str, args: A) -> String
    where
        A: Into<HashMap<&'a str, FluentValue<'a>>>,
    {
        let args: HashMap<&str, FluentValue<'_>> = args.into();
        let args: HashMap<Cow<'static, str>, FluentValue<'_>> = args
            .into_iter()
            .map(|(key, value)| (Cow::Owned(key.to_string()), value))
            .collect();
        LOCALES.lookup_with_args(&self.lang_id, text_id, &args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_fallback() {
        let mut locale = Locale::with_system();
        locale.set_language_tag("not a tag!");

        assert_eq!(locale.text("button-ok"), "OK");
        assert!(locale
            .text_args("installer-title", [("app_name", "Insight Reader".into())])
            .contains("Insight Reader"));
    }
}
