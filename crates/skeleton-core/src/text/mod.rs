pub mod lexer;
pub mod normalize;
pub mod sanitize;
