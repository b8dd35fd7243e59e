//! Offline fitting of the registry models from the survey CSV.

use crate::{
    artifacts::{Artifact, ArtifactFormat, ArtifactStore},
    error::AppError,
    estimators::{Classifier, Estimator},
    features::{FEATURE_COUNT, FEATURE_NAMES},
    registry::{ModelId, Target},
    types::ReportedScores,
};
use chrono::{DateTime, Utc};
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    io::Read,
    path::{Path, PathBuf},
    time::Instant,
};
use tracing::{debug, info};

pub const MANIFEST_FILE: &str = "manifest.toml";

/// Feature rows with both binarized labels. Label value 1 is the positive
/// class; every other value is the negative class.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub feature_columns: Vec<String>,
    pub rows: Vec<Vec<f64>>,
    pub y1: Vec<u8>,
    pub y2: Vec<u8>,
}

fn is_index_column(name: &str) -> bool {
    let name = name.trim();
    name.is_empty() || name.starts_with("Unnamed:")
}

/// Header comparison key. Case and punctuation are ignored, so
/// `OpenlyIdentified_MH_Work` names the `openly_identified_mh_work` feature.
fn header_key(name: &str) -> String {
    name.chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Map the dataset's feature headers onto `FEATURE_NAMES`. Every header must
/// name a survey feature, in vector order, since rows are read positionally.
fn resolve_feature_columns(headers: &[&str]) -> Result<Vec<String>, AppError> {
    if headers.len() != FEATURE_COUNT {
        return Err(AppError::Dataset(format!(
            "expected {} feature columns, found {}",
            FEATURE_COUNT,
            headers.len()
        )));
    }
    for (position, (header, expected)) in headers.iter().zip(FEATURE_NAMES).enumerate() {
        let key = header_key(header);
        if key == header_key(expected) {
            continue;
        }
        return Err(match FEATURE_NAMES.iter().position(|name| header_key(name) == key) {
            Some(at) => AppError::Dataset(format!(
                "column '{}' is at position {} where '{}' is expected; it belongs at {}",
                header, position, expected, at
            )),
            None => AppError::Dataset(format!("unknown feature column '{}'", header)),
        });
    }
    Ok(FEATURE_NAMES.iter().map(|name| name.to_string()).collect())
}

fn parse_cell(value: &str, line: usize, column: &str) -> Result<f64, AppError> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| {
            AppError::Dataset(format!(
                "line {}: column '{}' has non-numeric value '{}'",
                line, column, value
            ))
        })
}

impl Dataset {
    pub fn from_path(path: &Path) -> Result<Self, AppError> {
        if !path.is_file() {
            return Err(AppError::Dataset(format!(
                "dataset not found: {}",
                path.display()
            )));
        }
        let dataset = Self::from_reader(fs::File::open(path)?)?;
        info!(
            "Loaded {} rows with {} features from {}",
            dataset.len(),
            dataset.feature_columns.len(),
            path.display()
        );
        Ok(dataset)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, AppError> {
        let mut reader = csv::Reader::from_reader(reader);
        let headers = reader.headers()?.clone();

        let find = |target: Target| {
            headers
                .iter()
                .position(|h| h.trim() == target.column())
                .ok_or_else(|| {
                    AppError::Dataset(format!("missing label column '{}'", target.column()))
                })
        };
        let y1_col = find(Target::Y1)?;
        let y2_col = find(Target::Y2)?;

        let feature_idx: Vec<usize> = headers
            .iter()
            .enumerate()
            .filter(|&(i, name)| i != y1_col && i != y2_col && !is_index_column(name))
            .map(|(i, _)| i)
            .collect();
        let names: Vec<&str> = feature_idx.iter().map(|&i| headers[i].trim()).collect();
        let feature_columns = resolve_feature_columns(&names)?;

        let mut dataset = Dataset {
            feature_columns,
            rows: Vec::new(),
            y1: Vec::new(),
            y2: Vec::new(),
        };

        for (n, record) in reader.records().enumerate() {
            let record = record?;
            // header is line 1
            let line = n + 2;
            let cell = |i: usize| parse_cell(record.get(i).unwrap_or(""), line, &headers[i]);

            let row = feature_idx.iter().map(|&i| cell(i)).collect::<Result<Vec<_>, _>>()?;
            dataset.y1.push(u8::from(cell(y1_col)? == 1.0));
            dataset.y2.push(u8::from(cell(y2_col)? == 1.0));
            dataset.rows.push(row);
        }

        if dataset.rows.is_empty() {
            return Err(AppError::Dataset("dataset has no rows".to_string()));
        }
        Ok(dataset)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Shuffled train/test partition of row indices; the test part holds
    /// `ceil(test_ratio * n)` rows. Both targets use the same partition.
    pub fn split(&self, test_ratio: f64, seed: u64) -> Result<Split, AppError> {
        let n = self.len();
        let n_test = (test_ratio * n as f64).ceil() as usize;
        if n_test == 0 || n_test >= n {
            return Err(AppError::Dataset(format!(
                "cannot hold out {} of {} rows for testing",
                n_test, n
            )));
        }

        let mut indices: Vec<usize> = (0..n).collect();
        indices.shuffle(&mut StdRng::seed_from_u64(seed));
        let train = indices.split_off(n_test);
        Ok(Split {
            train,
            test: indices,
        })
    }

    fn select(&self, indices: &[usize], target: Target) -> (Vec<Vec<f64>>, Vec<u8>) {
        let labels = match target {
            Target::Y1 => &self.y1,
            Target::Y2 => &self.y2,
        };
        indices
            .iter()
            .map(|&i| (self.rows[i].clone(), labels[i]))
            .unzip()
    }
}

#[derive(Debug, Clone)]
pub struct Split {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// F1 of the positive class. Zero when there are no true positives.
pub fn f1_score(truth: &[u8], predicted: &[u8]) -> f64 {
    let (mut tp, mut fp, mut fn_) = (0.0, 0.0, 0.0);
    for (&t, &p) in truth.iter().zip(predicted) {
        match (t, p) {
            (1, 1) => tp += 1.0,
            (0, 1) => fp += 1.0,
            (1, 0) => fn_ += 1.0,
            _ => {}
        }
    }
    if tp == 0.0 {
        return 0.0;
    }
    2.0 * tp / (2.0 * tp + fp + fn_)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub key: String,
    pub name: String,
    pub y1_artifact: PathBuf,
    pub y2_artifact: PathBuf,
    /// Measured on the held-out split.
    pub test_f1: ReportedScores,
    pub reported_f1: ReportedScores,
    pub fit_seconds: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub trained_at: DateTime<Utc>,
    pub format: ArtifactFormat,
    pub rows: usize,
    pub train_rows: usize,
    pub test_rows: usize,
    pub split_seed: u64,
    pub models: Vec<ManifestEntry>,
}

pub struct Trainer {
    store: ArtifactStore,
    test_ratio: f64,
    split_seed: u64,
}

impl Trainer {
    pub fn new(store: ArtifactStore, test_ratio: f64, split_seed: u64) -> Self {
        Self {
            store,
            test_ratio,
            split_seed,
        }
    }

    /// Fit both targets of every requested model, save the artifacts and
    /// write the manifest next to them.
    pub fn train(&self, dataset: &Dataset, models: &[ModelId]) -> Result<Manifest, AppError> {
        let split = dataset.split(self.test_ratio, self.split_seed)?;
        info!(
            "Training {} models on {} rows, testing on {}",
            models.len(),
            split.train.len(),
            split.test.len()
        );

        let mut entries = Vec::with_capacity(models.len());
        for &model in models {
            entries.push(self.train_model(dataset, &split, model)?);
        }

        let manifest = Manifest {
            trained_at: Utc::now(),
            format: self.store.format(),
            rows: dataset.len(),
            train_rows: split.train.len(),
            test_rows: split.test.len(),
            split_seed: self.split_seed,
            models: entries,
        };
        self.write_manifest(&manifest)?;
        Ok(manifest)
    }

    fn train_model(&self, dataset: &Dataset, split: &Split, model: ModelId) -> Result<ManifestEntry, AppError> {
        let start = Instant::now();
        let params = model.params();
        let mut paths = Vec::with_capacity(2);
        let mut scores = Vec::with_capacity(2);

        for target in Target::ALL {
            let (x_train, y_train) = dataset.select(&split.train, target);
            let (x_test, y_test) = dataset.select(&split.test, target);

            let estimator = Estimator::fit(&params, &x_train, &y_train)?;
            let predicted: Vec<u8> = x_test.iter().map(|row| estimator.predict(row)).collect();
            let f1 = f1_score(&y_test, &predicted);
            debug!("{} {} test F1 {:.4}", model.key(), target.suffix(), f1);

            let artifact = Artifact::new(model, target, dataset.feature_columns.clone(), estimator);
            paths.push(self.store.save(&artifact)?);
            scores.push(f1);
        }

        let test_f1 = ReportedScores {
            y1: scores[0],
            y2: scores[1],
        };
        let fit_seconds = start.elapsed().as_secs_f64();
        info!(
            "Trained {} in {:.1}s: test F1 y1={:.4} y2={:.4}",
            model, fit_seconds, test_f1.y1, test_f1.y2
        );

        let y2_artifact = paths.pop().unwrap_or_default();
        let y1_artifact = paths.pop().unwrap_or_default();
        Ok(ManifestEntry {
            key: model.key().to_string(),
            name: model.display_name().to_string(),
            y1_artifact,
            y2_artifact,
            test_f1,
            reported_f1: model.reported_f1(),
            fit_seconds,
        })
    }

    fn write_manifest(&self, manifest: &Manifest) -> Result<PathBuf, AppError> {
        let path = self.store.dir().join(MANIFEST_FILE);
        let text = toml::to_string_pretty(manifest)
            .map_err(|e| AppError::Internal(format!("manifest: {}", e)))?;
        fs::write(&path, text)?;
        info!("Wrote manifest to {}", path.display());
        Ok(path)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Survey-shaped CSV: an unnamed index column, 51 features and both
    /// label columns. y1 is 1 when the first feature is 1; y2 is 1 when the
    /// second feature is 1 and 2 ("Maybe") otherwise half of the time.
    pub(crate) fn survey_csv(rows: usize) -> String {
        let mut out = String::from(",");
        out.push_str(&FEATURE_NAMES.join(","));
        out.push_str(&format!(",\"{}\",\"{}\"\n", Target::Y1.column(), Target::Y2.column()));
        for i in 0..rows {
            let mut values = vec![0.0; FEATURE_COUNT];
            values[0] = (i % 2) as f64;
            values[1] = ((i / 2) % 2) as f64;
            values[2] = (i % 7) as f64;
            let y1 = i % 2;
            let y2 = if (i / 2) % 2 == 1 { 1 } else { 2 * ((i / 4) % 2) };
            let cells: Vec<String> = values.iter().map(|v| v.to_string()).collect();
            out.push_str(&format!("{},{},{},{}\n", i, cells.join(","), y1, y2));
        }
        out
    }

    #[test]
    fn test_dataset_drops_index_and_labels() {
        let dataset = Dataset::from_reader(survey_csv(20).as_bytes()).expect("parse");
        assert_eq!(dataset.len(), 20);
        assert_eq!(dataset.feature_columns.len(), FEATURE_COUNT);
        assert_eq!(dataset.feature_columns[0], FEATURE_NAMES[0]);
        assert_eq!(dataset.rows[3][0], 1.0);
        assert_eq!(dataset.y1[3], 1);
        // "2" binarizes to the negative class
        assert_eq!(dataset.y2[4], 0);
        assert_eq!(dataset.y2[2], 1);
    }

    #[test]
    fn test_dataset_rejects_wrong_width() {
        let csv = format!(
            "a,b,\"{}\",\"{}\"\n1,2,0,1\n",
            Target::Y1.column(),
            Target::Y2.column()
        );
        let err = Dataset::from_reader(csv.as_bytes()).unwrap_err();
        assert!(matches!(err, AppError::Dataset(_)));
    }

    #[test]
    fn test_dataset_rejects_reordered_columns() {
        let swapped = survey_csv(6).replacen(
            "self_employed,discuss_mh_prev_coworker",
            "discuss_mh_prev_coworker,self_employed",
            1,
        );
        let err = Dataset::from_reader(swapped.as_bytes()).unwrap_err();
        assert!(matches!(err, AppError::Dataset(_)));
        assert!(err.to_string().contains("'discuss_mh_prev_coworker' is at position 1"));
    }

    #[test]
    fn test_dataset_rejects_unknown_columns() {
        let renamed = survey_csv(6).replacen("self_employed", "freelance", 1);
        let err = Dataset::from_reader(renamed.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("unknown feature column 'freelance'"));
    }

    #[test]
    fn test_dataset_resolves_header_spelling() {
        let csv = survey_csv(6).replacen(
            "openly_identified_mh_work,self_employed",
            "OpenlyIdentified_MH_Work, Self-Employed",
            1,
        );
        let dataset = Dataset::from_reader(csv.as_bytes()).expect("parse");
        assert_eq!(dataset.feature_columns[0], "openly_identified_mh_work");
        assert_eq!(dataset.feature_columns[1], "self_employed");
        assert!(dataset.feature_columns.iter().zip(FEATURE_NAMES).all(|(a, b)| a == b));
    }

    #[test]
    fn test_header_keys_are_distinct() {
        let mut keys: Vec<String> = FEATURE_NAMES.iter().map(|name| header_key(name)).collect();
        keys.sort();
        keys.dedup();
        assert_eq!(keys.len(), FEATURE_COUNT);
    }

    #[test]
    fn test_dataset_requires_label_columns() {
        let err = Dataset::from_reader("a,b\n1,2\n".as_bytes()).unwrap_err();
        assert!(err.to_string().contains("missing label column"));
    }

    #[test]
    fn test_missing_dataset_fails() {
        let dir = tempfile::tempdir().expect("tmpdir");
        let err = Dataset::from_path(&dir.path().join("final.csv")).unwrap_err();
        assert!(matches!(err, AppError::Dataset(_)));
    }

    #[test]
    fn test_split_is_seeded_and_disjoint() {
        let dataset = Dataset::from_reader(survey_csv(50).as_bytes()).expect("parse");
        let a = dataset.split(0.2, 25).expect("split");
        let b = dataset.split(0.2, 25).expect("split");
        assert_eq!(a.test, b.test);
        assert_eq!(a.test.len(), 10);
        assert_eq!(a.train.len(), 40);
        assert!(a.test.iter().all(|i| !a.train.contains(i)));

        // 0.2 * 11 rounds up to 3
        let small = Dataset::from_reader(survey_csv(11).as_bytes()).expect("parse");
        assert_eq!(small.split(0.2, 25).expect("split").test.len(), 3);
    }

    #[test]
    fn test_f1_score() {
        assert_eq!(f1_score(&[1, 0, 1, 1], &[1, 0, 1, 1]), 1.0);
        assert_eq!(f1_score(&[0, 0], &[0, 0]), 0.0);
        approx::assert_relative_eq!(f1_score(&[1, 1, 0, 0], &[1, 0, 1, 0]), 0.5);
    }

    #[test]
    fn test_trainer_writes_artifacts_and_manifest() {
        let dir = tempfile::tempdir().expect("tmpdir");
        let store = ArtifactStore::new(dir.path(), ArtifactFormat::Json);
        let dataset = Dataset::from_reader(survey_csv(40).as_bytes()).expect("parse");

        let manifest = Trainer::new(store.clone(), 0.2, 25)
            .train(&dataset, &[ModelId::DecisionTree, ModelId::LogisticRegression])
            .expect("train");

        assert_eq!(manifest.models.len(), 2);
        assert_eq!(manifest.test_rows, 8);
        for model in [ModelId::DecisionTree, ModelId::LogisticRegression] {
            for target in Target::ALL {
                assert!(store.path(model, target).is_file());
            }
        }
        assert!((0.0..=1.0).contains(&manifest.models[0].test_f1.y1));

        let tree = store.load(ModelId::DecisionTree, Target::Y1).expect("load");
        for (row, &label) in dataset.rows.iter().zip(&dataset.y1) {
            assert_eq!(tree.estimator.predict(row), label);
        }

        let text = fs::read_to_string(dir.path().join(MANIFEST_FILE)).expect("manifest");
        let parsed: Manifest = toml::from_str(&text).expect("parse manifest");
        assert_eq!(parsed.models[1].key, "logreg");
        assert_eq!(parsed.split_seed, 25);
    }
}
