//! Payload Handler Contract
//!
//! The server hands decoded bodies to a handler; the tokenization engine is
//! the production implementation.

use tokenizer::{CardStore, CryptoProvider, Tokenizer, TokenizerResult, Transformed};

/// Body transformations invoked by the ICAP server
#[trait_variant::make(PayloadHandler: Send)]
pub trait LocalPayloadHandler {
    /// Card numbers in card fields become tokens
    async fn tokenize_json(&self, body: &str) -> TokenizerResult<Transformed>;

    /// Known tokens anywhere in the document become card numbers
    async fn detokenize_json(&self, body: &str) -> TokenizerResult<Transformed>;

    /// Known tokens anywhere in the text become card numbers
    async fn detokenize_html(&self, body: &str) -> TokenizerResult<Transformed>;
}

impl<S, C> PayloadHandler for Tokenizer<S, C>
where
    S: CardStore + Sync,
    C: CryptoProvider,
{
    async fn tokenize_json(&self, body: &str) -> TokenizerResult<Transformed> {
        Tokenizer::tokenize_json(self, body).await
    }

    async fn detokenize_json(&self, body: &str) -> TokenizerResult<Transformed> {
        Tokenizer::detokenize_json(self, body).await
    }

    async fn detokenize_html(&self, body: &str) -> TokenizerResult<Transformed> {
        Tokenizer::detokenize_html(self, body).await
    }
}
