#[cfg(test)]
mod tests {
    use super::super::*;

    #[test]
    fn test_empty_file_gives_defaults() {
        let cfg = Config::from_toml("").unwrap();
        assert_eq!(cfg.source.server, PreprintServer::MedRxiv);
        assert_eq!(cfg.reputation.threshold, 10);
        assert_eq!(cfg.llm.kind, BackendKind::Ollama);
        assert_eq!(cfg.llm.max_words, 20);
        assert_eq!(cfg.llm.max_tokens, 100);
        assert_eq!(cfg.publisher.field_of_study, "Medicine");
        assert_eq!(cfg.data_source(), "medRxiv");
        assert!(!cfg.publisher.is_private);
        assert_eq!(cfg.store.path, "processed_titles.txt");
    }

    #[test]
    fn test_partial_sections_keep_other_defaults() {
        let cfg = Config::from_toml(
            r#"
            [source]
            server = "biorxiv"
            max_retries = 5

            [llm]
            kind = "openai_compatible"
            model = "Phi-3-mini-4k-instruct"
            base_url = "https://models.inference.ai.azure.com"
            chat_path = "/chat/completions"

            [publisher]
            field_of_study = "Biology"
            data_source = "bioRxiv"
            "#,
        )
        .unwrap();

        assert_eq!(cfg.source.server, PreprintServer::BioRxiv);
        assert_eq!(cfg.source.retry().max_retries, 5);
        assert_eq!(cfg.source.timeout_secs, 30);
        assert_eq!(cfg.llm.kind, BackendKind::OpenAiCompatible);
        assert_eq!(cfg.llm.chat_path.as_deref(), Some("/chat/completions"));
        assert_eq!(cfg.llm.max_words, 20);
        assert_eq!(cfg.publisher.field_of_study, "Biology");
        assert_eq!(cfg.data_source(), "bioRxiv");
        assert_eq!(cfg.publisher.api_base, SEECHAT_API_BASE);
    }

    #[test]
    fn test_data_source_follows_server_unless_set() {
        let cfg = Config::from_toml("[source]\nserver = \"biorxiv\"").unwrap();
        assert_eq!(cfg.data_source(), "bioRxiv");

        let cfg = Config::from_toml("[source]\nserver = \"biorxiv\"\n[publisher]\ndata_source = \"Cold Spring Harbor\"").unwrap();
        assert_eq!(cfg.data_source(), "Cold Spring Harbor");
    }

    #[test]
    fn test_zero_word_budget_rejected() {
        assert!(Config::from_toml("[llm]\nmax_words = 0").is_err());
    }

    #[test]
    fn test_unknown_backend_kind_rejected() {
        assert!(Config::from_toml("[llm]\nkind = \"gemini\"").is_err());
    }

    #[test]
    fn test_configured_secret_wins_over_env() {
        use secrecy::ExposeSecret;
        let key = resolve_secret(Some(" sk-from-file "), "HYPOFORGE_TEST_UNSET_KEY").unwrap();
        assert_eq!(key.expose_secret(), "sk-from-file");
        assert!(resolve_secret(Some(""), "HYPOFORGE_TEST_UNSET_KEY").is_none());
        assert!(resolve_secret(None, "HYPOFORGE_TEST_UNSET_KEY").is_none());
    }

    #[test]
    fn test_missing_file_error_mentions_example() {
        let err = Config::load(Some("/nonexistent/hypoforge.toml")).unwrap_err();
        assert!(err.to_string().contains("hypoforge.example.toml"));
    }
}
