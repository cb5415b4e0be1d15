//! Engine-level tests for the tokenizer crate

#[cfg(test)]
mod token_tests {
    use crate::domain::token::{TokenFormat, TokenGenerator};
    use platform::card::is_valid_luhn;
    use std::collections::HashSet;

    const DRAWS: usize = 10_000;

    #[test]
    fn test_prefix_tokens_unique() {
        let generator = TokenGenerator::new(TokenFormat::Prefix);
        let tokens: HashSet<String> = (0..DRAWS).map(|_| generator.generate()).collect();
        assert_eq!(tokens.len(), DRAWS);
    }

    #[test]
    fn test_luhn_tokens_unique_and_valid() {
        let generator = TokenGenerator::new(TokenFormat::Luhn);
        let mut tokens = HashSet::with_capacity(DRAWS);
        for _ in 0..DRAWS {
            let token = generator.generate();
            assert!(is_valid_luhn(&token), "token {token} fails Luhn");
            assert!(token.starts_with("9999"));
            tokens.insert(token);
        }
        assert_eq!(tokens.len(), DRAWS);
    }
}

#[cfg(test)]
mod engine_tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use parking_lot::RwLock;
    use serde_json::{Value, json};

    use crate::application::config::TokenizerConfig;
    use crate::application::engine::Tokenizer;
    use crate::domain::repository::CardStore;
    use crate::domain::token::TokenFormat;
    use crate::error::{TokenizerError, TokenizerResult};
    use crate::infra::crypto::{KeyMaterial, LegacyCipher};
    use crate::infra::memory::InMemoryCardVault;

    const VISA: &str = "4111111111111111";
    const MASTERCARD: &str = "5555555555554444";

    type Vault = InMemoryCardVault<LegacyCipher>;

    /// Plaintext store used to seed mappings directly
    #[derive(Default)]
    struct MapStore {
        cards: RwLock<HashMap<String, String>>,
    }

    impl CardStore for MapStore {
        async fn store_card(&self, token: &str, card_number: &str) -> TokenizerResult<()> {
            self.cards
                .write()
                .insert(token.to_string(), card_number.to_string());
            Ok(())
        }

        async fn retrieve_card(&self, token: &str) -> Option<String> {
            self.cards.read().get(token).cloned()
        }
    }

    /// Store whose writes always fail
    struct FailingStore;

    impl CardStore for FailingStore {
        async fn store_card(&self, _token: &str, _card_number: &str) -> TokenizerResult<()> {
            Err(TokenizerError::Storage("store offline".to_string()))
        }

        async fn retrieve_card(&self, _token: &str) -> Option<String> {
            None
        }
    }

    fn crypto() -> Arc<LegacyCipher> {
        Arc::new(LegacyCipher::new(KeyMaterial::generate()))
    }

    fn engine(format: TokenFormat) -> (Tokenizer<Vault, LegacyCipher>, Arc<Vault>) {
        let crypto = crypto();
        let vault = Arc::new(InMemoryCardVault::new(crypto.clone()));
        let config = Arc::new(TokenizerConfig::new(format));
        (Tokenizer::new(vault.clone(), crypto, config), vault)
    }

    fn parse(text: &str) -> Value {
        serde_json::from_str(text).unwrap()
    }

    #[tokio::test]
    async fn test_tokenize_card_field() {
        let (tokenizer, vault) = engine(TokenFormat::Prefix);
        let input = json!({"card_number": VISA, "name": "Alice"}).to_string();

        let out = tokenizer.tokenize_json(&input).await.unwrap();
        assert!(out.modified);

        let doc = parse(&out.body);
        let token = doc["card_number"].as_str().unwrap();
        assert!(token.starts_with("tok_"));
        assert_eq!(doc["name"], "Alice");
        assert_eq!(vault.len(), 1);
        assert_eq!(vault.record(token).unwrap().last_four, "1111");
    }

    #[tokio::test]
    async fn test_tokenize_preserves_key_order() {
        let (tokenizer, _) = engine(TokenFormat::Prefix);
        let input = r#"{"zeta":1,"card":"4111111111111111","alpha":[true,null]}"#;

        let out = tokenizer.tokenize_json(input).await.unwrap();
        let keys: Vec<String> = parse(&out.body)
            .as_object()
            .unwrap()
            .keys()
            .cloned()
            .collect();
        assert_eq!(keys, vec!["zeta", "card", "alpha"]);
    }

    #[tokio::test]
    async fn test_tokenize_keeps_number_text() {
        let (tokenizer, _) = engine(TokenFormat::Prefix);
        let input = r#"{"order_id":123456789012345678901234567890,"amount":10.10,"card":"4111111111111111"}"#;

        let out = tokenizer.tokenize_json(input).await.unwrap();
        assert!(out.modified);
        assert!(
            out.body
                .starts_with(r#"{"order_id":123456789012345678901234567890,"amount":10.10,"card":"tok_"#),
            "{}",
            out.body
        );
    }

    #[tokio::test]
    async fn test_tokenize_is_idempotent() {
        for format in [TokenFormat::Prefix, TokenFormat::Luhn] {
            let (tokenizer, vault) = engine(format);
            let input = json!({"payment": {"pan": MASTERCARD}}).to_string();

            let once = tokenizer.tokenize_json(&input).await.unwrap();
            assert!(once.modified);
            let twice = tokenizer.tokenize_json(&once.body).await.unwrap();
            assert!(!twice.modified);
            assert_eq!(twice.body, once.body);
            assert_eq!(vault.len(), 1);
        }
    }

    #[tokio::test]
    async fn test_round_trip() {
        for format in [TokenFormat::Prefix, TokenFormat::Luhn] {
            let (tokenizer, _) = engine(format);
            let input = json!({"order": 7, "credit_card": VISA}).to_string();

            let tokenized = tokenizer.tokenize_json(&input).await.unwrap();
            assert_ne!(tokenized.body, input);
            let restored = tokenizer.detokenize_json(&tokenized.body).await.unwrap();
            assert!(restored.modified);
            assert_eq!(parse(&restored.body), parse(&input));
        }
    }

    #[tokio::test]
    async fn test_field_name_heuristic() {
        let (tokenizer, vault) = engine(TokenFormat::Prefix);
        let input = json!({
            "card": VISA,
            "cards": VISA,
            "discard": VISA,
            "account_number": MASTERCARD,
            "Billing_CardNumber": MASTERCARD,
        })
        .to_string();

        let doc = parse(&tokenizer.tokenize_json(&input).await.unwrap().body);
        assert!(doc["card"].as_str().unwrap().starts_with("tok_"));
        assert_eq!(doc["cards"], VISA);
        assert_eq!(doc["discard"], VISA);
        assert!(doc["account_number"].as_str().unwrap().starts_with("tok_"));
        assert!(doc["Billing_CardNumber"].as_str().unwrap().starts_with("tok_"));
        assert_eq!(vault.len(), 3);
    }

    #[tokio::test]
    async fn test_tokenize_nested_arrays() {
        let (tokenizer, vault) = engine(TokenFormat::Luhn);
        let input = json!({
            "customers": [
                {"wallet": [{"card": VISA}, {"card": MASTERCARD}]},
                {"card": "not a card"},
            ]
        })
        .to_string();

        let out = tokenizer.tokenize_json(&input).await.unwrap();
        let doc = parse(&out.body);
        let wallet = &doc["customers"][0]["wallet"];
        assert!(wallet[0]["card"].as_str().unwrap().starts_with("9999"));
        assert!(wallet[1]["card"].as_str().unwrap().starts_with("9999"));
        assert_eq!(doc["customers"][1]["card"], "not a card");
        assert_eq!(vault.len(), 2);
    }

    #[tokio::test]
    async fn test_card_outside_card_field_untouched() {
        let (tokenizer, vault) = engine(TokenFormat::Prefix);
        let input = json!({"note": VISA, "list": [VISA]}).to_string();

        let out = tokenizer.tokenize_json(&input).await.unwrap();
        assert!(!out.modified);
        assert_eq!(out.body, input);
        assert!(vault.is_empty());
    }

    #[tokio::test]
    async fn test_detokenize_known_token() {
        let store = Arc::new(MapStore::default());
        store.store_card("tok_known", VISA).await.unwrap();
        let tokenizer = Tokenizer::new(store, crypto(), Arc::new(TokenizerConfig::default()));

        let out = tokenizer
            .detokenize_json(r#"{"card_number":"tok_known"}"#)
            .await
            .unwrap();
        assert!(out.modified);
        assert_eq!(out.body, format!(r#"{{"card_number":"{VISA}"}}"#));
    }

    #[tokio::test]
    async fn test_detokenize_any_field_and_arrays() {
        let store = Arc::new(MapStore::default());
        store.store_card("tok_a", VISA).await.unwrap();
        store.store_card("tok_b", MASTERCARD).await.unwrap();
        let tokenizer = Tokenizer::new(store, crypto(), Arc::new(TokenizerConfig::default()));

        let input = json!({"ref": "tok_a", "history": ["tok_b", "tok_unknown", 3]}).to_string();
        let doc = parse(&tokenizer.detokenize_json(&input).await.unwrap().body);
        assert_eq!(doc["ref"], VISA);
        assert_eq!(doc["history"], json!([MASTERCARD, "tok_unknown", 3]));
    }

    #[tokio::test]
    async fn test_detokenize_miss_is_unmodified() {
        let (tokenizer, _) = engine(TokenFormat::Prefix);
        let input = r#"{"card": "tok_nothing_here"}"#;

        let out = tokenizer.detokenize_json(input).await.unwrap();
        assert!(!out.modified);
        assert_eq!(out.body, input);
    }

    #[tokio::test]
    async fn test_invalid_json_is_error() {
        let (tokenizer, _) = engine(TokenFormat::Prefix);
        let err = tokenizer.tokenize_json("<html>").await.unwrap_err();
        assert!(matches!(err, TokenizerError::Decode(_)));
        assert_eq!(err.kind(), crate::ErrorKind::BadRequest);
        assert!(tokenizer.detokenize_json("{").await.is_err());
    }

    #[tokio::test]
    async fn test_storage_failure_still_substitutes() {
        let tokenizer = Tokenizer::new(
            Arc::new(FailingStore),
            crypto(),
            Arc::new(TokenizerConfig::default()),
        );
        let out = tokenizer
            .tokenize_json(&json!({"pan": VISA}).to_string())
            .await
            .unwrap();
        assert!(out.modified);
        assert!(parse(&out.body)["pan"].as_str().unwrap().starts_with("tok_"));
    }

    #[tokio::test]
    async fn test_detokenize_html() {
        let store = Arc::new(MapStore::default());
        store.store_card("9999000000000017", VISA).await.unwrap();
        let config = Arc::new(TokenizerConfig::new(TokenFormat::Luhn));
        let tokenizer = Tokenizer::new(store, crypto(), config);

        let html = "<p>9999000000000017</p><p>9999000000000017</p><p>9999111111111111</p>";
        let out = tokenizer.detokenize_html(html).await.unwrap();
        assert!(out.modified);
        assert_eq!(
            out.body,
            format!("<p>{VISA}</p><p>{VISA}</p><p>9999111111111111</p>")
        );

        let plain = tokenizer.detokenize_html("<p>nothing</p>").await.unwrap();
        assert!(!plain.modified);
        assert_eq!(plain.body, "<p>nothing</p>");
    }

    #[tokio::test]
    async fn test_card_number_encryption_helpers() {
        let (tokenizer, _) = engine(TokenFormat::Prefix);
        let (ciphertext, key_id) = tokenizer.encrypt_card_number(VISA).unwrap();
        assert_eq!(key_id, "legacy");
        assert_eq!(tokenizer.decrypt_card_number(&ciphertext, &key_id).unwrap(), VISA);
        assert!(tokenizer.generate_token().starts_with("tok_"));
    }
}
