pub mod catalog;
pub mod tagging;
pub mod track_resolver;
pub mod url_utils;
