//! Dependency parsing
//!
//! The parser itself is an external service. This module holds the
//! CoNLL-U reader for its output and a client for the UDPipe REST API.

use std::time::Duration;

use async_trait::async_trait;
use kgb_core::{DependencyConfig, KgbError, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};

// ============================================================================
// CoNLL-U model
// ============================================================================

/// One syntactic word of a sentence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    /// 1-based position in the sentence
    pub id: usize,
    /// Surface form
    pub form: String,
    /// Lemma (`_` when the parser gives none)
    pub lemma: String,
    /// Universal POS tag
    pub upos: String,
    /// Head position, 0 for the root
    pub head: usize,
    /// Dependency relation to the head
    pub deprel: String,
}

impl Token {
    /// Lemma, falling back to the lower-cased form
    pub fn lemma_or_form(&self) -> String {
        if self.lemma.is_empty() || self.lemma == "_" {
            self.form.to_lowercase()
        } else {
            self.lemma.clone()
        }
    }
}

/// A parsed sentence
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Sentence {
    /// Raw sentence text from the `# text =` comment
    pub text: Option<String>,
    pub tokens: Vec<Token>,
}

impl Sentence {
    /// Look up a token by id
    pub fn token(&self, id: usize) -> Option<&Token> {
        match self.tokens.get(id.wrapping_sub(1)) {
            Some(token) if token.id == id => Some(token),
            _ => self.tokens.iter().find(|t| t.id == id),
        }
    }

    /// Syntactic head of a token (`None` for the root)
    pub fn head_of(&self, token: &Token) -> Option<&Token> {
        if token.head == 0 {
            None
        } else {
            self.token(token.head)
        }
    }

    /// Dependents of `head` that precede it, left to right
    pub fn left_children<'a>(&'a self, head: &'a Token) -> impl Iterator<Item = &'a Token> + 'a {
        self.tokens
            .iter()
            .filter(move |t| t.head == head.id && t.id < head.id)
    }
}

/// Parse CoNLL-U text into sentences
///
/// Multiword token ranges (`3-4`) and empty nodes (`5.1`) are skipped.
pub fn parse_conllu(input: &str) -> Result<Vec<Sentence>> {
    let mut sentences = Vec::new();
    let mut current = Sentence::default();

    for (index, line) in input.lines().enumerate() {
        let line_no = index + 1;
        let line = line.trim_end_matches('\r');

        if line.trim().is_empty() {
            if !current.tokens.is_empty() {
                sentences.push(std::mem::take(&mut current));
            } else {
                current.text = None;
            }
            continue;
        }

        if let Some(comment) = line.strip_prefix('#') {
            if let Some(text) = comment.trim_start().strip_prefix("text =") {
                current.text = Some(text.trim().to_string());
            }
            continue;
        }

        let columns: Vec<&str> = line.split('\t').collect();
        if columns.len() != 10 {
            return Err(KgbError::Parse(format!(
                "CoNLL-U line {line_no}: expected 10 columns, found {}",
                columns.len()
            )));
        }

        let id = columns[0];
        if id.contains('-') || id.contains('.') {
            continue;
        }

        let id: usize = id.parse().map_err(|_| {
            KgbError::Parse(format!("CoNLL-U line {line_no}: invalid token id '{id}'"))
        })?;
        let head: usize = columns[6].parse().map_err(|_| {
            KgbError::Parse(format!(
                "CoNLL-U line {line_no}: invalid head '{}'",
                columns[6]
            ))
        })?;

        current.tokens.push(Token {
            id,
            form: columns[1].to_string(),
            lemma: columns[2].to_string(),
            upos: columns[3].to_string(),
            head,
            deprel: columns[7].to_string(),
        });
    }

    if !current.tokens.is_empty() {
        sentences.push(current);
    }

    Ok(sentences)
}

// ============================================================================
// Parser trait and UDPipe client
// ============================================================================

/// Trait for dependency parsers
#[async_trait]
pub trait DependencyParser: Send + Sync {
    /// Split text into sentences and parse each one
    async fn parse(&self, text: &str) -> Result<Vec<Sentence>>;
}

#[derive(Debug, Deserialize)]
struct UdpipeResponse {
    result: String,
}

/// Client for the UDPipe REST service
pub struct UdpipeClient {
    client: Client,
    base_url: String,
    model: String,
}

impl UdpipeClient {
    /// Create a new UDPipe client
    pub fn new(base_url: impl Into<String>, model: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| KgbError::Config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
        })
    }

    /// Create from config
    pub fn from_config(config: &DependencyConfig) -> Result<Self> {
        Self::new(
            config.udpipe_url.clone(),
            config.model.clone(),
            Duration::from_secs(config.timeout_secs),
        )
    }
}

#[async_trait]
impl DependencyParser for UdpipeClient {
    async fn parse(&self, text: &str) -> Result<Vec<Sentence>> {
        let form = [
            ("tokenizer", ""),
            ("tagger", ""),
            ("parser", ""),
            ("model", self.model.as_str()),
            ("data", text),
        ];

        let response = self
            .client
            .post(format!("{}/process", self.base_url))
            .form(&form)
            .send()
            .await
            .map_err(|e| KgbError::Inference(format!("UDPipe request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(KgbError::Inference(format!(
                "UDPipe returned {status}: {error_text}"
            )));
        }

        let body: UdpipeResponse = response
            .json()
            .await
            .map_err(|e| KgbError::Inference(format!("Failed to parse UDPipe response: {e}")))?;

        let sentences = parse_conllu(&body.result)?;
        tracing::debug!(sentences = sentences.len(), "Dependency parse finished");
        Ok(sentences)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    pub(crate) const JOBS_CONLLU: &str = "\
# sent_id = 1
# text = Steve Jobs founded Apple.
1\tSteve\tSteve\tPROPN\tNNP\t_\t3\tnsubj\t_\t_
2\tJobs\tJobs\tPROPN\tNNP\t_\t1\tflat\t_\t_
3\tfounded\tfound\tVERB\tVBD\t_\t0\troot\t_\t_
4\tApple\tApple\tPROPN\tNNP\t_\t3\tobj\t_\tSpaceAfter=No
5\t.\t.\tPUNCT\t.\t_\t3\tpunct\t_\t_

# sent_id = 2
# text = Apple makes the iPhone.
1\tApple\tApple\tPROPN\tNNP\t_\t2\tnsubj\t_\t_
2\tmakes\tmake\tVERB\tVBZ\t_\t0\troot\t_\t_
3\tthe\tthe\tDET\tDT\t_\t4\tdet\t_\t_
4\tiPhone\tiPhone\tPROPN\tNNP\t_\t2\tobj\t_\tSpaceAfter=No
5\t.\t.\tPUNCT\t.\t_\t2\tpunct\t_\t_
";

    #[test]
    fn test_parse_conllu_sentences() {
        let sentences = parse_conllu(JOBS_CONLLU).unwrap();

        assert_eq!(sentences.len(), 2);
        assert_eq!(
            sentences[0].text.as_deref(),
            Some("Steve Jobs founded Apple.")
        );
        assert_eq!(sentences[0].tokens.len(), 5);

        let apple = &sentences[0].tokens[3];
        assert_eq!(apple.form, "Apple");
        assert_eq!(apple.deprel, "obj");
        assert_eq!(sentences[0].head_of(apple).unwrap().lemma, "found");
    }

    #[test]
    fn test_left_children() {
        let sentences = parse_conllu(JOBS_CONLLU).unwrap();
        let sentence = &sentences[0];
        let verb = sentence.token(3).unwrap();

        let lefts: Vec<&str> = sentence
            .left_children(verb)
            .map(|t| t.form.as_str())
            .collect();
        assert_eq!(lefts, vec!["Steve"]);
        assert!(sentence.head_of(verb).is_none());
    }

    #[test]
    fn test_parse_conllu_skips_ranges_and_empty_nodes() {
        let input = "\
1-2\tdon't\t_\t_\t_\t_\t_\t_\t_\t_
1\tdo\tdo\tAUX\t_\t_\t3\taux\t_\t_
2\tn't\tnot\tPART\t_\t_\t3\tadvmod\t_\t_
3\tgo\tgo\tVERB\t_\t_\t0\troot\t_\t_
3.1\tgo\tgo\tVERB\t_\t_\t_\t_\t_\t_
";
        let sentences = parse_conllu(input).unwrap();
        assert_eq!(sentences.len(), 1);
        assert_eq!(sentences[0].tokens.len(), 3);
    }

    #[test]
    fn test_parse_conllu_errors() {
        let err = parse_conllu("1\tonly\tthree").unwrap_err();
        assert!(matches!(err, KgbError::Parse(msg) if msg.contains("line 1")));

        let err = parse_conllu("1\ta\ta\tX\t_\t_\tnope\tdep\t_\t_").unwrap_err();
        assert!(matches!(err, KgbError::Parse(msg) if msg.contains("invalid head")));

        assert!(parse_conllu("").unwrap().is_empty());
    }

    #[test]
    fn test_lemma_fallback() {
        let token = Token {
            id: 1,
            form: "Runs".to_string(),
            lemma: "_".to_string(),
            upos: "VERB".to_string(),
            head: 0,
            deprel: "root".to_string(),
        };
        assert_eq!(token.lemma_or_form(), "runs");
    }

    #[tokio::test]
    async fn test_udpipe_client() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/process"))
            .and(body_string_contains("model=english"))
            .and(body_string_contains("data=Steve+Jobs+founded+Apple."))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "model": "english-ewt-ud-2.12",
                "acknowledgements": [],
                "result": JOBS_CONLLU
            })))
            .mount(&server)
            .await;

        let client = UdpipeClient::new(server.uri(), "english", Duration::from_secs(5)).unwrap();
        let sentences = client.parse("Steve Jobs founded Apple.").await.unwrap();
        assert_eq!(sentences.len(), 2);
    }

    #[tokio::test]
    async fn test_udpipe_client_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string("Unknown model"))
            .mount(&server)
            .await;

        let client = UdpipeClient::new(server.uri(), "klingon", Duration::from_secs(5)).unwrap();
        let err = client.parse("text").await.unwrap_err();
        assert!(matches!(err, KgbError::Inference(msg) if msg.contains("Unknown model")));
    }
}
