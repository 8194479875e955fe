pub mod definition;
pub mod document_symbols;
