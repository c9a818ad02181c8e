//! # DistilBERT Classifier
//!
//! SST-2 fine-tuned DistilBERT run on CPU with candle.
//!
//! ## Files
//! A model directory, or the hub repo it was downloaded from, must hold:
//! - `config.json`: DistilBERT hyperparameters plus `id2label`
//! - `vocab.txt`: WordPiece vocabulary, one token per line
//! - `model.safetensors`: weights under `distilbert.*`, `pre_classifier.*` and `classifier.*`
//!
//! ## Inference
//! - Text is lowercased, WordPiece tokenized and wrapped in `[CLS] .. [SEP]`
//! - Input longer than `max_position_embeddings` is truncated
//! - The `[CLS]` hidden state goes through `pre_classifier`, ReLU and `classifier`
//! - Softmax scores are returned highest first
use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

use candle_core::{D, DType, Device, IndexOp, Module, Tensor};
use candle_nn::{Linear, VarBuilder, linear, ops::softmax};
use candle_transformers::models::distilbert::{Config as DistilBertConfig, DistilBertModel};
use hf_hub::{Repo, RepoType, api::sync::ApiBuilder};
use serde::Deserialize;
use tokenizers::{
    Tokenizer, TruncationParams,
    models::{ModelWrapper, wordpiece::WordPiece},
    normalizers::{NormalizerWrapper, bert::BertNormalizer},
    pre_tokenizers::{PreTokenizerWrapper, bert::BertPreTokenizer},
    processors::{PostProcessorWrapper, bert::BertProcessing},
};
use tracing::info;

use super::fallback::{ModelError, Prediction, SentimentModel};

const CONFIG_FILE: &str = "config.json";
const VOCAB_FILE: &str = "vocab.txt";
const WEIGHTS_FILE: &str = "model.safetensors";

#[derive(Deserialize)]
struct HeadConfig {
    dim: usize,
    max_position_embeddings: usize,
    id2label: HashMap<String, String>,
}

pub struct DistilBertClassifier {
    tokenizer: Tokenizer,
    model: DistilBertModel,
    pre_classifier: Linear,
    classifier: Linear,
    labels: Vec<String>,
    device: Device,
}

fn load_error(context: &str) -> impl Fn(String) -> ModelError + '_ {
    move |reason| ModelError::Load(format!("{context}: {reason}"))
}

impl DistilBertClassifier {
    pub fn from_dir(dir: &Path) -> Result<Self, ModelError> {
        Self::from_files(
            &dir.join(CONFIG_FILE),
            &dir.join(VOCAB_FILE),
            &dir.join(WEIGHTS_FILE),
        )
    }

    /// Downloads the model files into the local hub cache, or reuses them if present.
    pub fn from_hub(model_id: &str) -> Result<Self, ModelError> {
        let hub_error = load_error(model_id);

        let api = ApiBuilder::new()
            .with_progress(false)
            .with_retries(3)
            .build()
            .map_err(|err| hub_error(format!("failed building hf-hub client: {err}")))?;
        let repo = api.repo(Repo::new(model_id.to_string(), RepoType::Model));

        let fetch = |file: &str| -> Result<PathBuf, ModelError> {
            info!("Fetching {file} from {model_id}");

            repo.get(file)
                .map_err(|err| hub_error(format!("failed downloading '{file}': {err}")))
        };

        Self::from_files(
            &fetch(CONFIG_FILE)?,
            &fetch(VOCAB_FILE)?,
            &fetch(WEIGHTS_FILE)?,
        )
    }

    fn from_files(config: &Path, vocab: &Path, weights: &Path) -> Result<Self, ModelError> {
        let raw_config = fs::read_to_string(config)
            .map_err(|err| load_error(&config.display().to_string())(err.to_string()))?;

        let model_config: DistilBertConfig = serde_json::from_str(&raw_config)
            .map_err(|err| load_error(CONFIG_FILE)(err.to_string()))?;
        let head: HeadConfig = serde_json::from_str(&raw_config)
            .map_err(|err| load_error(CONFIG_FILE)(err.to_string()))?;

        let labels = ordered_labels(&head.id2label)?;
        let tokenizer = bert_tokenizer(vocab, head.max_position_embeddings)?;

        let device = Device::Cpu;
        let buffer = fs::read(weights)
            .map_err(|err| load_error(&weights.display().to_string())(err.to_string()))?;

        let weights_error = load_error(WEIGHTS_FILE);
        let vb = VarBuilder::from_buffered_safetensors(buffer, DType::F32, &device)
            .map_err(|err| weights_error(err.to_string()))?;

        let model = DistilBertModel::load(vb.pp("distilbert"), &model_config)
            .map_err(|err| weights_error(err.to_string()))?;
        let pre_classifier = linear(head.dim, head.dim, vb.pp("pre_classifier"))
            .map_err(|err| weights_error(err.to_string()))?;
        let classifier = linear(head.dim, labels.len(), vb.pp("classifier"))
            .map_err(|err| weights_error(err.to_string()))?;

        info!("Loaded DistilBERT classifier with labels {labels:?}");

        Ok(Self {
            tokenizer,
            model,
            pre_classifier,
            classifier,
            labels,
            device,
        })
    }

    fn probabilities(&self, ids: &[u32]) -> candle_core::Result<Vec<f32>> {
        let input_ids = Tensor::new(ids, &self.device)?.unsqueeze(0)?;

        // Nonzero entries are masked out, a single unpadded sequence attends everywhere.
        let mask = Tensor::zeros((ids.len(), ids.len()), DType::U8, &self.device)?;

        let hidden = self.model.forward(&input_ids, &mask)?;
        let pooled = self.pre_classifier.forward(&hidden.i((.., 0))?)?.relu()?;
        let logits = self.classifier.forward(&pooled)?;

        softmax(&logits, D::Minus1)?.squeeze(0)?.to_vec1::<f32>()
    }
}

/// `id2label` keys are stringified class indices.
fn ordered_labels(id2label: &HashMap<String, String>) -> Result<Vec<String>, ModelError> {
    let mut indexed = id2label
        .iter()
        .map(|(id, label)| {
            id.parse::<usize>()
                .map(|id| (id, label.clone()))
                .map_err(|_| load_error(CONFIG_FILE)(format!("invalid label id '{id}'")))
        })
        .collect::<Result<Vec<_>, _>>()?;

    if indexed.is_empty() {
        return Err(load_error(CONFIG_FILE)("id2label is empty".to_string()));
    }

    indexed.sort_by_key(|(id, _)| *id);

    Ok(indexed.into_iter().map(|(_, label)| label).collect())
}

fn bert_tokenizer(vocab: &Path, max_length: usize) -> Result<Tokenizer, ModelError> {
    let vocab_error = load_error(VOCAB_FILE);

    let wordpiece = WordPiece::from_file(&vocab.display().to_string())
        .unk_token("[UNK]".to_string())
        .build()
        .map_err(|err| vocab_error(err.to_string()))?;

    let mut tokenizer = Tokenizer::new(ModelWrapper::WordPiece(wordpiece));

    let special = |token: &str| {
        tokenizer
            .token_to_id(token)
            .map(|id| (token.to_string(), id))
            .ok_or_else(|| vocab_error(format!("missing {token}")))
    };
    let sep = special("[SEP]")?;
    let cls = special("[CLS]")?;

    tokenizer
        .with_normalizer(NormalizerWrapper::BertNormalizer(BertNormalizer::default()))
        .with_pre_tokenizer(PreTokenizerWrapper::BertPreTokenizer(BertPreTokenizer))
        .with_post_processor(PostProcessorWrapper::Bert(BertProcessing::new(sep, cls)));

    tokenizer
        .with_truncation(Some(TruncationParams {
            max_length,
            ..Default::default()
        }))
        .map_err(|err| vocab_error(err.to_string()))?;

    Ok(tokenizer)
}

impl SentimentModel for DistilBertClassifier {
    fn predict(&self, text: &str) -> Result<Vec<Prediction>, ModelError> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|err| ModelError::Inference(err.to_string()))?;

        let probabilities = self
            .probabilities(encoding.get_ids())
            .map_err(|err| ModelError::Inference(err.to_string()))?;

        let mut predictions: Vec<Prediction> = self
            .labels
            .iter()
            .zip(probabilities)
            .map(|(label, score)| Prediction {
                label: Some(label.clone()),
                score,
            })
            .collect();

        predictions.sort_by(|a, b| b.score.total_cmp(&a.score));

        Ok(predictions)
    }

    fn vocabulary(&self) -> &[String] {
        &self.labels
    }
}

#[cfg(test)]
mod tests {
    use candle_nn::VarMap;
    use serde_json::json;
    use tempfile::TempDir;

    use super::*;
    use crate::sentiment::fallback::{FallbackClassifier, ModelSource, NEGATIVE, POSITIVE};

    const VOCAB: &str = "[PAD]\n[UNK]\n[CLS]\n[SEP]\ngood\nbad\n";

    fn tiny_config() -> serde_json::Value {
        json!({
            "vocab_size": 6,
            "dim": 4,
            "n_layers": 1,
            "n_heads": 2,
            "hidden_dim": 8,
            "activation": "gelu",
            "max_position_embeddings": 8,
            "initializer_range": 0.02,
            "pad_token_id": 0,
            "model_type": "distilbert",
            "id2label": { "0": NEGATIVE, "1": POSITIVE },
        })
    }

    /// Writes a randomly initialized model with the production file layout.
    fn tiny_model_dir() -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        let config = tiny_config();

        fs::write(dir.path().join(CONFIG_FILE), config.to_string()).unwrap();
        fs::write(dir.path().join(VOCAB_FILE), VOCAB).unwrap();

        let model_config: DistilBertConfig = serde_json::from_value(config).unwrap();
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);

        DistilBertModel::load(vb.pp("distilbert"), &model_config).unwrap();
        linear(4, 4, vb.pp("pre_classifier")).unwrap();
        linear(4, 2, vb.pp("classifier")).unwrap();

        varmap.save(dir.path().join(WEIGHTS_FILE)).unwrap();

        dir
    }

    #[test]
    fn test_predict_distribution() {
        let dir = tiny_model_dir();
        let model = DistilBertClassifier::from_dir(dir.path()).unwrap();

        let predictions = model.predict("Good, not bad").unwrap();

        assert_eq!(predictions.len(), 2);
        assert!(predictions[0].score >= predictions[1].score);

        let total: f32 = predictions.iter().map(|p| p.score).sum();
        assert!((total - 1.0).abs() < 1e-4);

        for prediction in predictions {
            assert!(model.vocabulary().contains(prediction.label.as_ref().unwrap()));
        }
    }

    #[test]
    fn test_long_input_truncated() {
        let dir = tiny_model_dir();
        let model = DistilBertClassifier::from_dir(dir.path()).unwrap();

        let text = "good bad unknownword ".repeat(50);

        assert_eq!(model.predict(&text).unwrap().len(), 2);
        assert_eq!(model.predict("").unwrap().len(), 2);
    }

    #[test]
    fn test_classifier_from_directory() {
        let dir = tiny_model_dir();
        let classifier =
            FallbackClassifier::load(&ModelSource::Directory(dir.path().to_path_buf())).unwrap();

        let label = classifier.classify("good").unwrap();

        assert!(label == POSITIVE || label == NEGATIVE);
    }

    #[test]
    fn test_missing_weights() {
        let dir = tiny_model_dir();
        fs::remove_file(dir.path().join(WEIGHTS_FILE)).unwrap();

        assert!(matches!(
            DistilBertClassifier::from_dir(dir.path()),
            Err(ModelError::Load(_))
        ));
    }

    #[test]
    fn test_vocab_without_special_tokens() {
        let dir = tiny_model_dir();
        fs::write(dir.path().join(VOCAB_FILE), "[UNK]\ngood\n").unwrap();

        assert!(matches!(
            DistilBertClassifier::from_dir(dir.path()),
            Err(ModelError::Load(_))
        ));
    }

    #[test]
    fn test_ordered_labels() {
        let id2label = HashMap::from([
            ("1".to_string(), POSITIVE.to_string()),
            ("0".to_string(), NEGATIVE.to_string()),
        ]);

        assert_eq!(ordered_labels(&id2label).unwrap(), [NEGATIVE, POSITIVE]);
        assert!(ordered_labels(&HashMap::new()).is_err());
        assert!(ordered_labels(&HashMap::from([("x".to_string(), "y".to_string())])).is_err());
    }
}
