pub mod amount_words;
pub mod audit;
pub mod payments;
pub mod settlement;
pub mod statement_link;
pub mod statement_pdf;
