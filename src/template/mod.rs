//! Result template engine
//!
//! Result cards are configured as template strings such as
//! `<b>{title|upper}</b> {tags|pill:color=byval}`. This module parses those
//! strings, resolves their variables against a result record and runs the
//! filter pipeline:
//! - [`TemplateString`] / [`TemplateVariable`]: parsing and rendering
//! - [`FilterRegistry`]: named filters, built-ins registered once
//! - [`TagReplacer`]: `[[pill|...]]` tags inside rendered text
//! - [`HtmlElement`]: small HTML builder shared by filters

mod context;
mod error;
pub mod filters;
mod html;
mod string;
pub mod tags;
mod variable;

pub use context::{ChoiceSource, RenderContext};
pub use error::TemplateError;
pub use filters::{FilterRegistry, TemplateFilter};
pub use html::{color_from_value, escape_html, HtmlElement, COLOR_CLASSES};
pub use string::{
    display_value, error_html, join_list, render_template, sanitize_html, scalar_to_string,
    to_display_json, TemplateString,
};
pub use tags::{Tag, TagReplacer};
pub use variable::{FilterOptions, FilterSpec, TemplateVariable};
