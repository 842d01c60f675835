//! Render context shared by template strings, filters and tags

use crate::models::ListChoices;

use super::filters::FilterRegistry;

/// Source of search-field choice lists, used to translate stored keys
pub trait ChoiceSource: Send + Sync {
    /// Choice list of the search field `field_name`, if it has one
    fn choices(&self, field_name: &str) -> Option<&ListChoices>;
}

/// Everything a render pass needs besides the data itself
#[derive(Clone, Copy)]
pub struct RenderContext<'a> {
    /// Filters available to `{value|filter}` tokens
    pub filters: &'a FilterRegistry,
    /// Choice lists for `fieldify` and tag translations
    pub choices: Option<&'a dyn ChoiceSource>,
    /// Active language code, e.g. `en` or `de`
    pub language: &'a str,
    /// Render errors as alert boxes instead of dropping them
    pub show_errors: bool,
    /// Separator for list values
    pub list_separator: &'a str,
}

impl Default for RenderContext<'static> {
    fn default() -> Self {
        Self {
            filters: FilterRegistry::builtin(),
            choices: None,
            language: "en",
            show_errors: false,
            list_separator: ", ",
        }
    }
}

impl<'a> RenderContext<'a> {
    pub fn with_filters(mut self, filters: &'a FilterRegistry) -> Self {
        self.filters = filters;
        self
    }

    pub fn with_choices(mut self, choices: &'a dyn ChoiceSource) -> Self {
        self.choices = Some(choices);
        self
    }

    pub fn with_language(mut self, language: &'a str) -> Self {
        self.language = language;
        self
    }

    pub fn with_show_errors(mut self, show_errors: bool) -> Self {
        self.show_errors = show_errors;
        self
    }

    pub fn with_list_separator(mut self, separator: &'a str) -> Self {
        self.list_separator = separator;
        self
    }

    /// Choice list of `field_name` from the configured source
    pub fn choices_for(&self, field_name: &str) -> Option<&'a ListChoices> {
        self.choices.and_then(|source| source.choices(field_name))
    }
}

impl std::fmt::Debug for RenderContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderContext")
            .field("language", &self.language)
            .field("show_errors", &self.show_errors)
            .field("list_separator", &self.list_separator)
            .field("has_choices", &self.choices.is_some())
            .finish()
    }
}
