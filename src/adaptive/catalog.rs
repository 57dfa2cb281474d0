use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::adaptive::types::{DifficultyTier, StimulusType};
use crate::error::{EngineError, EngineResult};

fn all_modalities() -> Vec<StimulusType> {
    StimulusType::ALL.to_vec()
}

/// A learnable word or letter. Static for the lifetime of the process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogItem {
    pub id: String,
    pub text: String,
    pub difficulty_tier: DifficultyTier,
    #[serde(default)]
    pub syllables: Vec<String>,
    #[serde(default)]
    pub letters: Vec<String>,
    #[serde(default)]
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(default = "all_modalities")]
    pub supported_modalities: Vec<StimulusType>,
    #[serde(default)]
    pub usage_frequency: u32,
}

impl CatalogItem {
    pub fn supports(&self, modality: StimulusType) -> bool {
        self.supported_modalities.contains(&modality)
    }
}

/// Read-only access to the ordered item catalog.
pub trait ItemCatalogSource: Send + Sync {
    /// Every item, in catalog order.
    fn all_items(&self) -> &[CatalogItem];

    fn items_by_tier(&self, tier: DifficultyTier) -> Vec<&CatalogItem> {
        self.all_items()
            .iter()
            .filter(|item| item.difficulty_tier == tier)
            .collect()
    }

    fn find(&self, item_id: &str) -> Option<&CatalogItem> {
        self.all_items().iter().find(|item| item.id == item_id)
    }

    /// First item of the lowest tier that has any items.
    fn first_of_lowest_tier(&self) -> Option<&CatalogItem> {
        DifficultyTier::ALL
            .into_iter()
            .find_map(|tier| self.items_by_tier(tier).into_iter().next())
    }
}

#[derive(Debug, Clone)]
pub struct StaticCatalog {
    items: Vec<CatalogItem>,
    index: HashMap<String, usize>,
}

impl StaticCatalog {
    pub fn new(items: Vec<CatalogItem>) -> EngineResult<Self> {
        if items.is_empty() {
            return Err(EngineError::EmptyCatalog);
        }

        let mut index = HashMap::with_capacity(items.len());
        for (position, item) in items.iter().enumerate() {
            if item.id.trim().is_empty() {
                return Err(EngineError::InvalidCatalog(format!(
                    "item at position {position} has an empty id"
                )));
            }
            if index.insert(item.id.clone(), position).is_some() {
                return Err(EngineError::InvalidCatalog(format!(
                    "duplicate item id {}",
                    item.id
                )));
            }
            if item.supported_modalities.is_empty() {
                tracing::warn!(item_id = %item.id, "catalog item supports no modality");
            }
        }

        Ok(Self { items, index })
    }

    pub fn from_json_str(raw: &str) -> EngineResult<Self> {
        let items: Vec<CatalogItem> =
            serde_json::from_str(raw).map_err(|e| EngineError::InvalidCatalog(e.to_string()))?;
        Self::new(items)
    }

    pub fn from_path(path: impl AsRef<Path>) -> EngineResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            EngineError::InvalidCatalog(format!("failed to read {}: {e}", path.display()))
        })?;
        let catalog = Self::from_json_str(&raw)?;
        tracing::info!(path = %path.display(), items = catalog.len(), "loaded item catalog");
        Ok(catalog)
    }

    /// The built-in Portuguese word catalog.
    pub fn builtin() -> Self {
        let items = default_word_catalog();
        let index = items
            .iter()
            .enumerate()
            .map(|(position, item)| (item.id.clone(), position))
            .collect();
        Self { items, index }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl ItemCatalogSource for StaticCatalog {
    fn all_items(&self) -> &[CatalogItem] {
        &self.items
    }

    fn find(&self, item_id: &str) -> Option<&CatalogItem> {
        self.index.get(item_id).map(|&position| &self.items[position])
    }
}

fn word(
    text: &str,
    tier: DifficultyTier,
    syllables: &[&str],
    category: &str,
    context: &str,
    modalities: &[StimulusType],
    usage_frequency: u32,
) -> CatalogItem {
    CatalogItem {
        id: text.to_lowercase(),
        text: text.to_string(),
        difficulty_tier: tier,
        syllables: syllables.iter().map(|s| s.to_string()).collect(),
        letters: text.chars().map(String::from).collect(),
        category: category.to_string(),
        context: Some(context.to_string()),
        supported_modalities: modalities.to_vec(),
        usage_frequency,
    }
}

pub fn default_word_catalog() -> Vec<CatalogItem> {
    use DifficultyTier::{Easy, Hard, Medium};
    use StimulusType::{Auditory, Tactile, Visual};

    vec![
        word("CASA", Easy, &["CA", "SA"], "objeto", "moradia", &[Visual, Auditory], 10),
        word("BOLA", Easy, &["BO", "LA"], "brinquedos", "Esta é uma bola para brincar.", &[Visual, Auditory, Tactile], 9),
        word("GATO", Easy, &["GA", "TO"], "animais", "Este é um gato, um animal de estimação.", &[Visual, Auditory], 7),
        word("PATO", Easy, &["PA", "TO"], "animais", "O pato nada no lago.", &[Visual, Auditory, Tactile], 6),
        word("CARRO", Medium, &["CAR", "RO"], "veículo", "transporte", &[Visual, Auditory], 8),
        word("SAPATO", Medium, &["SA", "PA", "TO"], "vestuário", "Eu calço o sapato para sair.", &[Visual, Auditory, Tactile], 7),
        word("JANELA", Medium, &["JA", "NE", "LA"], "objeto", "A janela da sala está aberta.", &[Visual, Auditory], 6),
        word("CAVALO", Medium, &["CA", "VA", "LO"], "animais", "O cavalo corre no campo.", &[Visual, Auditory, Tactile], 5),
        word("BORBOLETA", Hard, &["BOR", "BO", "LE", "TA"], "animais", "A borboleta pousou na flor.", &[Visual, Auditory], 5),
        word("ELEFANTE", Hard, &["E", "LE", "FAN", "TE"], "animais", "O elefante tem uma tromba comprida.", &[Visual, Auditory, Tactile], 4),
        word("CHOCOLATE", Hard, &["CHO", "CO", "LA", "TE"], "alimentos", "O chocolate é doce.", &[Visual, Auditory], 6),
        word("BICICLETA", Hard, &["BI", "CI", "CLE", "TA"], "veículo", "Vamos andar de bicicleta no parque.", &[Visual, Auditory, Tactile], 4),
    ]
}
