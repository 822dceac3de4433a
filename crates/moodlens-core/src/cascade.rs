//! Structural check of OpenCV Haar cascade XML files.
//!
//! OpenCV trusts the node indices in `internalNodes` and walks them until
//! it reaches a leaf, so a damaged file can hang or crash the detector.
//! [`inspect`] reads the `<cascade>` layout written by
//! `opencv_traincascade` and rejects anything OpenCV could not evaluate
//! safely before the file is handed to `CascadeClassifier`.

use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

/// A Haar feature has at most three weighted rectangles.
const MAX_FEATURE_RECTS: usize = 3;

#[derive(Error, Debug)]
pub enum CascadeError {
    #[error("cascade file not found: {0} — copy haarcascade_frontalface_default.xml from OpenCV's data/haarcascades")]
    NotFound(String),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed cascade XML: {0}")]
    Xml(#[from] quick_xml::DeError),
    #[error("invalid cascade: {0}")]
    Invalid(String),
    #[error("unsupported cascade: {0}")]
    Unsupported(String),
}

// --- XML layout ---

#[derive(Deserialize)]
struct StorageXml {
    cascade: CascadeXml,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CascadeXml {
    #[serde(default)]
    stage_type: Option<String>,
    #[serde(default)]
    feature_type: Option<String>,
    height: usize,
    width: usize,
    stages: Items<StageXml>,
    features: Items<FeatureXml>,
}

/// OpenCV serializes sequences as repeated `<_>` children.
#[derive(Deserialize)]
struct Items<T> {
    #[serde(rename = "_", default)]
    items: Vec<T>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StageXml {
    weak_classifiers: Items<WeakXml>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WeakXml {
    internal_nodes: String,
    leaf_values: String,
}

#[derive(Deserialize)]
struct FeatureXml {
    rects: Items<String>,
}

/// Summary of a cascade that passed [`inspect`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CascadeInfo {
    /// Base detection window (width, height).
    pub window: (usize, usize),
    pub stages: usize,
    pub features: usize,
}

/// Check the cascade file at `path`.
pub fn inspect(path: &str) -> Result<CascadeInfo, CascadeError> {
    if !Path::new(path).exists() {
        return Err(CascadeError::NotFound(path.to_string()));
    }
    let xml = std::fs::read_to_string(path)?;
    inspect_xml(&xml)
}

/// Check cascade XML text.
pub fn inspect_xml(xml: &str) -> Result<CascadeInfo, CascadeError> {
    let storage: StorageXml = quick_xml::de::from_str(xml)?;
    let raw = storage.cascade;

    if let Some(kind) = raw.stage_type.as_deref() {
        if kind.trim() != "BOOST" {
            return Err(CascadeError::Unsupported(format!("stage type {kind}")));
        }
    }
    if let Some(kind) = raw.feature_type.as_deref() {
        if kind.trim() != "HAAR" {
            return Err(CascadeError::Unsupported(format!("feature type {kind}")));
        }
    }
    if raw.width < 3 || raw.height < 3 {
        return Err(CascadeError::Invalid(format!(
            "window {}x{} is too small",
            raw.width, raw.height
        )));
    }

    for (i, feature) in raw.features.items.iter().enumerate() {
        check_feature(i, feature, raw.width, raw.height)?;
    }
    for (i, stage) in raw.stages.items.iter().enumerate() {
        check_stage(i, stage, raw.features.items.len())?;
    }
    if raw.stages.items.is_empty() {
        return Err(CascadeError::Invalid("cascade has no stages".into()));
    }

    Ok(CascadeInfo {
        window: (raw.width, raw.height),
        stages: raw.stages.items.len(),
        features: raw.features.items.len(),
    })
}

fn parse_numbers<T: std::str::FromStr>(text: &str, what: &str) -> Result<Vec<T>, CascadeError> {
    text.split_whitespace()
        .map(|tok| {
            tok.parse::<T>()
                .map_err(|_| CascadeError::Invalid(format!("{what}: bad number {tok:?}")))
        })
        .collect()
}

fn check_feature(
    index: usize,
    raw: &FeatureXml,
    win_w: usize,
    win_h: usize,
) -> Result<(), CascadeError> {
    if raw.rects.items.is_empty() || raw.rects.items.len() > MAX_FEATURE_RECTS {
        return Err(CascadeError::Invalid(format!(
            "feature {index} has {} rects",
            raw.rects.items.len()
        )));
    }

    for text in &raw.rects.items {
        let v: Vec<f32> = parse_numbers(text, "rect")?;
        if v.len() != 5 || v[..4].iter().any(|&n| n < 0.0 || n.fract() != 0.0) {
            return Err(CascadeError::Invalid(format!("feature {index}: bad rect {text:?}")));
        }
        let (x, y, w, h) = (v[0] as usize, v[1] as usize, v[2] as usize, v[3] as usize);
        if x + w > win_w || y + h > win_h {
            return Err(CascadeError::Invalid(format!(
                "feature {index}: rect {text:?} leaves the {win_w}x{win_h} window"
            )));
        }
    }
    Ok(())
}

/// Every weak tree must be a forward-only walk ending in a leaf: a child
/// `> 0` names a later node, a child `<= 0` names leaf `-child`.
fn check_stage(index: usize, raw: &StageXml, num_features: usize) -> Result<(), CascadeError> {
    for (wi, weak) in raw.weak_classifiers.items.iter().enumerate() {
        let ctx = format!("stage {index} classifier {wi}");
        let fields: Vec<f64> = parse_numbers(&weak.internal_nodes, &ctx)?;
        let leaves: Vec<f32> = parse_numbers(&weak.leaf_values, &ctx)?;

        if fields.is_empty() || fields.len() % 4 != 0 {
            return Err(CascadeError::Invalid(format!("{ctx}: internalNodes not in groups of 4")));
        }
        let node_count = fields.len() / 4;

        for (ni, node) in fields.chunks_exact(4).enumerate() {
            let feature = node[2];
            if feature < 0.0 || feature as usize >= num_features {
                return Err(CascadeError::Invalid(format!("{ctx}: feature {feature} out of range")));
            }
            for child in [node[0] as i64, node[1] as i64] {
                let ok = if child > 0 {
                    (child as usize) > ni && (child as usize) < node_count
                } else {
                    ((-child) as usize) < leaves.len()
                };
                if !ok {
                    return Err(CascadeError::Invalid(format!(
                        "{ctx}: node {ni} has bad child {child}"
                    )));
                }
            }
        }
    }
    Ok(())
}
