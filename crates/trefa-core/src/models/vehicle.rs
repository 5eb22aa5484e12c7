//! Inventory vehicles as served by the read API.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::path_like::{normalize_paths_field, PathLike};

/// Status of vehicles that are listed publicly.
pub const LISTED_STATUS: &str = "Comprado";
pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;

pub const DEFAULT_PLACEHOLDER_IMAGE: &str = "https://jjepfehmuybpctdzipnu.supabase.co/storage/v1/object/public/fotos_airtable/app/sedan-2Artboard-12-trefa.png";

const PLACEHOLDER_IMAGES: &[(&str, &str)] = &[
    ("suv", "https://jjepfehmuybpctdzipnu.supabase.co/storage/v1/object/public/fotos_airtable/app/suv-2Artboard-12-trefa.png"),
    ("pick-up", "https://jjepfehmuybpctdzipnu.supabase.co/storage/v1/object/public/fotos_airtable/app/pickup-2Artboard-12-trefa-1.png"),
    ("pickup", "https://jjepfehmuybpctdzipnu.supabase.co/storage/v1/object/public/fotos_airtable/app/pickup-2Artboard-12-trefa-1.png"),
    ("sedan", "https://jjepfehmuybpctdzipnu.supabase.co/storage/v1/object/public/fotos_airtable/app/sedan-2Artboard-12-trefa.png"),
    ("sedán", "https://jjepfehmuybpctdzipnu.supabase.co/storage/v1/object/public/fotos_airtable/app/sedan-2Artboard-12-trefa.png"),
    ("hatchback", "https://jjepfehmuybpctdzipnu.supabase.co/storage/v1/object/public/fotos_airtable/app/hbArtboard-12-trefa.png"),
    ("motos", "https://jjepfehmuybpctdzipnu.supabase.co/storage/v1/object/public/fotos_airtable/app/motos-placeholder.png"),
    ("moto", "https://jjepfehmuybpctdzipnu.supabase.co/storage/v1/object/public/fotos_airtable/app/motos-placeholder.png"),
];

/// Branch display names and the codes stored in `ubicacion`.
const BRANCH_CODES: &[(&str, &str)] = &[
    ("Monterrey", "MTY"),
    ("Guadalupe", "GPE"),
    ("Reynosa", "TMPS"),
    ("Saltillo", "COAH"),
];

pub fn branch_code(display_name: &str) -> String {
    BRANCH_CODES
        .iter()
        .find(|(name, _)| *name == display_name)
        .map(|(_, code)| (*code).to_string())
        .unwrap_or_else(|| display_name.to_string())
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum OrderField {
    Price,
    Year,
    Mileage,
}

impl OrderField {
    pub fn column(&self) -> &'static str {
        match self {
            OrderField::Price => "precio",
            OrderField::Year => "autoano",
            OrderField::Mileage => "kilometraje",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct OrderBy {
    pub field: OrderField,
    pub ascending: bool,
}

impl OrderBy {
    /// Parse `price-asc`, `year-desc`, … Anything else is rejected.
    pub fn parse(raw: &str) -> Option<Self> {
        let (field, direction) = raw.trim().split_once('-')?;
        let field = match field {
            "price" => OrderField::Price,
            "year" => OrderField::Year,
            "mileage" => OrderField::Mileage,
            _ => return None,
        };
        let ascending = match direction {
            "asc" => true,
            "desc" => false,
            _ => return None,
        };
        Some(Self { field, ascending })
    }
}

/// Filters accepted by the vehicle listing.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VehicleFilters {
    pub marca: Vec<String>,
    pub autoano: Vec<i32>,
    pub transmision: Vec<String>,
    pub combustible: Vec<String>,
    pub garantia: Vec<String>,
    pub carroceria: Vec<String>,
    /// Branch codes (display names already mapped).
    pub ubicacion: Vec<String>,
    pub promociones: Vec<String>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub min_enganche: Option<f64>,
    pub max_enganche: Option<f64>,
    pub hide_separado: bool,
    pub search: Option<String>,
    pub order_by: Option<OrderBy>,
    pub page: u32,
    pub page_size: u32,
}

impl VehicleFilters {
    /// Build filters from raw query pairs; repeated keys accumulate.
    ///
    /// Unparsable numbers are ignored, as are zero-valued range bounds.
    pub fn from_query_pairs<K, V>(pairs: &[(K, V)]) -> Self
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut filters = VehicleFilters {
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
            ..Default::default()
        };

        for (key, value) in pairs {
            let value = value.as_ref().trim();
            match key.as_ref() {
                "marca" => push_non_empty(&mut filters.marca, value),
                "autoano" => {
                    if let Ok(year) = value.parse() {
                        filters.autoano.push(year);
                    }
                }
                "transmision" => push_non_empty(&mut filters.transmision, value),
                "combustible" => push_non_empty(&mut filters.combustible, value),
                "garantia" => push_non_empty(&mut filters.garantia, value),
                "carroceria" => push_non_empty(&mut filters.carroceria, value),
                "ubicacion" if !value.is_empty() => filters.ubicacion.push(branch_code(value)),
                "promociones" => push_non_empty(&mut filters.promociones, value),
                "minPrice" => filters.min_price = positive_number(value),
                "maxPrice" => filters.max_price = positive_number(value),
                "enganchemin" => filters.min_enganche = positive_number(value),
                "maxEnganche" => filters.max_enganche = positive_number(value),
                "hideSeparado" => filters.hide_separado = value == "true",
                "search" => {
                    filters.search = Some(value.to_string()).filter(|s| !s.is_empty());
                }
                "orderby" => filters.order_by = OrderBy::parse(value),
                "page" => {
                    filters.page = value.parse::<u32>().ok().filter(|p| *p > 0).unwrap_or(1);
                }
                "pageSize" => {
                    filters.page_size = value
                        .parse::<u32>()
                        .ok()
                        .filter(|p| *p > 0)
                        .unwrap_or(DEFAULT_PAGE_SIZE)
                        .min(MAX_PAGE_SIZE);
                }
                _ => {}
            }
        }

        filters
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page.saturating_sub(1)) * i64::from(self.page_size)
    }

    pub fn total_pages(&self, total_count: i64) -> i64 {
        if self.page_size == 0 {
            return 0;
        }
        let size = i64::from(self.page_size);
        (total_count + size - 1) / size
    }

    /// Stable key for caching results of this filter set.
    pub fn cache_key(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| format!("{:?}", self))
    }
}

fn push_non_empty(target: &mut Vec<String>, value: &str) {
    if !value.is_empty() {
        target.push(value.to_string());
    }
}

fn positive_number(value: &str) -> Option<f64> {
    value
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite() && *n != 0.0)
}

/// One page of a filtered listing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VehiclePage {
    pub vehicles: Vec<Value>,
    pub total_count: i64,
    pub page: u32,
    pub page_size: u32,
    pub total_pages: i64,
}

/// Placeholder image for a vehicle without photos, keyed by classification then body type.
pub fn placeholder_image(clasificacion: Option<&Value>, carroceria: Option<&Value>) -> &'static str {
    [clasificacion, carroceria]
        .into_iter()
        .flatten()
        .filter_map(first_text)
        .find_map(|raw| {
            let normalized = raw.to_lowercase().replace(' ', "-");
            PLACEHOLDER_IMAGES
                .iter()
                .find(|(key, _)| *key == normalized)
                .map(|(_, url)| *url)
        })
        .unwrap_or(DEFAULT_PLACEHOLDER_IMAGE)
}

fn first_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Array(items) => items.first().and_then(|v| v.as_str()).map(str::to_string),
        _ => None,
    }
}

/// Enrich one `inventario_cache` row with resolved image URLs.
///
/// The row's `id` is replaced by its `record_id`; raw image columns are kept under
/// `raw_*` keys and resolved URLs are exposed as `public_urls`, `thumbnail`,
/// `galeriaExterior` and `galeriaInterior`.
pub fn transform_vehicle(row: Map<String, Value>, public_base: Option<&str>) -> Value {
    let null = Value::Null;
    let feature_raw = row.get("feature_image").cloned().unwrap_or(Value::Null);
    let exterior_raw = row.get("fotos_exterior_url").cloned().unwrap_or(Value::Null);
    let interior_raw = row.get("fotos_interior_url").cloned().unwrap_or(Value::Null);

    let resolve = |paths: Vec<PathLike>| -> Vec<String> {
        paths
            .iter()
            .filter_map(|p| p.public_url(public_base))
            .collect()
    };
    let galeria_exterior = resolve(normalize_paths_field(&exterior_raw));
    let galeria_interior = resolve(normalize_paths_field(&interior_raw));

    let feature = feature_raw
        .as_str()
        .map(PathLike::classify)
        .and_then(|p| p.public_url(public_base))
        .or_else(|| galeria_exterior.first().cloned())
        .unwrap_or_else(|| {
            let clasificacion = row
                .get("clasificacionid")
                .or_else(|| row.get("ClasificacionID"))
                .filter(|v| !v.is_null());
            placeholder_image(clasificacion, row.get("carroceria")).to_string()
        });

    let record_id = row.get("record_id").unwrap_or(&null).clone();
    let mut out = Map::with_capacity(row.len() + 9);
    out.insert("id".to_string(), record_id.clone());
    out.insert("record_id".to_string(), record_id);
    for (key, value) in row {
        if key != "id" {
            out.insert(key, value);
        }
    }
    out.insert("raw_feature_image".to_string(), feature_raw);
    out.insert("raw_fotos_exterior".to_string(), exterior_raw);
    out.insert("raw_fotos_interior".to_string(), interior_raw);
    out.insert(
        "public_urls".to_string(),
        json!({
            "feature_image": feature,
            "galeriaExterior": galeria_exterior,
            "galeriaInterior": galeria_interior,
        }),
    );
    out.insert("thumbnail".to_string(), Value::String(feature));
    out.insert("galeriaExterior".to_string(), json!(galeria_exterior));
    out.insert("galeriaInterior".to_string(), json!(galeria_interior));

    Value::Object(out)
}
