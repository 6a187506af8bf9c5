//! Error types for tallysync-parser

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("XML syntax error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("Closing tag with no open element")]
    UnbalancedClose,

    #[error("Unclosed element: {tag}")]
    UnclosedElement { tag: String },
}
