//! Modelo de producto resuelto
//!
//! `ProductoCompleto` une los datos de `productos` o `pack_listados` con
//! `lista_precios_cantera` y `control_vencimientos_cantera`. Es lo que se
//! guarda en el cache y lo que recibe el POS.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Tabla de origen de un registro resuelto
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origen {
    Producto,
    Pack,
}

impl Origen {
    pub fn as_str(&self) -> &'static str {
        match self {
            Origen::Producto => "producto",
            Origen::Pack => "pack",
        }
    }
}

impl std::str::FromStr for Origen {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "producto" => Ok(Origen::Producto),
            "pack" => Ok(Origen::Pack),
            other => Err(format!("origen desconocido: {}", other)),
        }
    }
}

/// Lote con fecha de vencimiento
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FechaVencimiento {
    pub fecha_vencimiento: NaiveDate,
    pub cantidad: i32,
    pub lote: Option<String>,
}

/// Producto o pack con toda la información para el POS
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductoCompleto {
    // Campos básicos del producto
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i32>,
    pub codigo: String,
    pub nombre: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unidad: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub precio: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub codigo_barra_interno: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub codigo_barra_externo: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub descripcion: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub es_servicio: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub es_exento: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub impuesto_especifico: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_categoria: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disponible_para_venta: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activo: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub utilidad: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tipo_utilidad: Option<String>,

    pub origen: Origen,
    pub codigo_final: String,

    // Campos específicos de pack
    #[serde(skip_serializing_if = "Option::is_none")]
    pub codigo_pack: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nombre_pack: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub precio_base: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cantidad_articulo: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub codigo_articulo: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cod_barra_articulo: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nombre_articulo: Option<String>,

    // Campos de lista de precios
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lista_precio_detalle: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lista_precio_mayorista: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lista_updated_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fechas_vencimiento: Vec<FechaVencimiento>,
}

impl ProductoCompleto {
    pub fn es_pack(&self) -> bool {
        self.origen == Origen::Pack
    }

    /// Verdadero si el código Tivendo coincide con el código canónico o el del pack
    pub fn matches_catalog_code(&self, code: &str) -> bool {
        self.codigo == code || self.codigo_pack.as_deref() == Some(code)
    }

    /// Vista compacta para el POS
    pub fn to_pos_response(&self) -> ProductoPOSResponse {
        let mut response = ProductoPOSResponse {
            codigo: String::new(),
            nombre: self.nombre.clone(),
            codigo_barras: String::new(),
            es_pack: self.es_pack(),
            cantidad_pack: 1,
            precio: self.lista_precio_detalle.or(self.precio),
        };

        match self.origen {
            Origen::Pack => {
                response.codigo = self.codigo_pack.clone().unwrap_or_else(|| self.codigo.clone());
                response.codigo_barras = self.codigo_barra_interno.clone().unwrap_or_default();
                response.cantidad_pack = self.cantidad_articulo.unwrap_or(1);
            }
            Origen::Producto => {
                response.codigo = self.codigo.clone();
                response.codigo_barras = self
                    .codigo_barra_externo
                    .clone()
                    .or_else(|| self.codigo_barra_interno.clone())
                    .unwrap_or_default();
            }
        }

        response
    }
}

/// Respuesta optimizada para el POS
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductoPOSResponse {
    pub codigo: String,
    pub nombre: String,
    pub codigo_barras: String,
    pub es_pack: bool,
    pub cantidad_pack: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub precio: Option<Decimal>,
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn producto(codigo: &str, barcode: &str) -> ProductoCompleto {
        ProductoCompleto {
            id: Some(1),
            codigo: codigo.to_string(),
            nombre: format!("Producto {}", codigo),
            unidad: Some("UN".to_string()),
            precio: Some(Decimal::new(1990, 0)),
            codigo_barra_interno: None,
            codigo_barra_externo: Some(barcode.to_string()),
            descripcion: None,
            es_servicio: Some(false),
            es_exento: Some(false),
            impuesto_especifico: None,
            id_categoria: None,
            disponible_para_venta: Some(true),
            activo: Some(true),
            utilidad: None,
            tipo_utilidad: None,
            origen: Origen::Producto,
            codigo_final: codigo.to_string(),
            codigo_pack: None,
            nombre_pack: None,
            precio_base: None,
            cantidad_articulo: None,
            codigo_articulo: None,
            cod_barra_articulo: None,
            nombre_articulo: None,
            lista_precio_detalle: Some(Decimal::new(2090, 0)),
            lista_precio_mayorista: None,
            lista_updated_at: None,
            fechas_vencimiento: Vec::new(),
        }
    }

    pub fn pack(codigo_pack: &str, barcode: &str, cantidad: i32) -> ProductoCompleto {
        ProductoCompleto {
            id: None,
            codigo: codigo_pack.to_string(),
            nombre: format!("Pack {}", codigo_pack),
            unidad: None,
            precio: Some(Decimal::new(9990, 0)),
            codigo_barra_interno: Some(barcode.to_string()),
            codigo_barra_externo: Some(barcode.to_string()),
            descripcion: None,
            es_servicio: Some(false),
            es_exento: Some(false),
            impuesto_especifico: None,
            id_categoria: None,
            disponible_para_venta: Some(true),
            activo: Some(true),
            utilidad: None,
            tipo_utilidad: None,
            origen: Origen::Pack,
            codigo_final: codigo_pack.to_string(),
            codigo_pack: Some(codigo_pack.to_string()),
            nombre_pack: Some(format!("Pack {}", codigo_pack)),
            precio_base: Some(Decimal::new(9990, 0)),
            cantidad_articulo: Some(cantidad),
            codigo_articulo: Some("ART1".to_string()),
            cod_barra_articulo: Some("7800000000001".to_string()),
            nombre_articulo: Some("Artículo".to_string()),
            lista_precio_detalle: None,
            lista_precio_mayorista: None,
            lista_updated_at: None,
            fechas_vencimiento: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn test_pos_response_producto_prefers_external_barcode() {
        let mut p = producto("P100", "7801234567890");
        p.codigo_barra_interno = Some("INT-1".to_string());

        let pos = p.to_pos_response();
        assert_eq!(pos.codigo, "P100");
        assert_eq!(pos.codigo_barras, "7801234567890");
        assert!(!pos.es_pack);
        assert_eq!(pos.cantidad_pack, 1);
        assert_eq!(pos.precio, Some(Decimal::new(2090, 0)));
    }

    #[test]
    fn test_pos_response_pack() {
        let pos = pack("PK7", "7809999999999", 6).to_pos_response();
        assert_eq!(pos.codigo, "PK7");
        assert_eq!(pos.codigo_barras, "7809999999999");
        assert!(pos.es_pack);
        assert_eq!(pos.cantidad_pack, 6);
    }

    #[test]
    fn test_matches_catalog_code() {
        let p = producto("P100", "7801234567890");
        assert!(p.matches_catalog_code("P100"));
        assert!(!p.matches_catalog_code("P200"));

        let mut k = pack("PK7", "7809999999999", 6);
        k.codigo = "OTRO".to_string();
        assert!(k.matches_catalog_code("PK7"));
    }

    #[test]
    fn test_origen_serializes_lowercase() {
        let json = serde_json::to_value(producto("P1", "1")).unwrap();
        assert_eq!(json["origen"], "producto");
        assert!(json.get("codigo_pack").is_none());
        assert_eq!("pack".parse::<Origen>().unwrap(), Origen::Pack);
    }
}
