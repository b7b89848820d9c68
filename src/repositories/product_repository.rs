use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::PgPool;
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::models::{FechaVencimiento, Origen, ProductoCompleto, VersionDomain};
use crate::utils::errors::{AppError, AppResult};

/// Fuente autoritativa de productos, packs y versiones
#[async_trait]
pub trait ProductRepository: Send + Sync {
    /// Último `updated_at` del dominio; `None` si las tablas están vacías
    async fn get_latest_version(&self, domain: VersionDomain) -> AppResult<Option<DateTime<Utc>>>;

    /// Busca por código de barras (producto) o por código/código de barras de pack
    async fn get_record_by_code(&self, code: &str) -> AppResult<Option<ProductoCompleto>>;

    /// Productos activos y vendibles, ordenados por nombre
    async fn get_frequent_products(&self, limit: i64) -> AppResult<Vec<ProductoCompleto>>;

    async fn ping(&self) -> AppResult<()>;
}

/// Fila plana devuelta por las queries de producto y pack
#[derive(Debug, sqlx::FromRow)]
struct ProductoRow {
    id: Option<i32>,
    codigo: String,
    nombre: String,
    unidad: Option<String>,
    precio: Option<Decimal>,
    codigo_barra_interno: Option<String>,
    codigo_barra_externo: Option<String>,
    descripcion: Option<String>,
    es_servicio: Option<bool>,
    es_exento: Option<bool>,
    impuesto_especifico: Option<Decimal>,
    id_categoria: Option<i32>,
    disponible_para_venta: Option<bool>,
    activo: Option<bool>,
    utilidad: Option<Decimal>,
    tipo_utilidad: Option<String>,
    origen: String,
    codigo_final: String,
    codigo_pack: Option<String>,
    nombre_pack: Option<String>,
    precio_base: Option<Decimal>,
    cantidad_articulo: Option<i32>,
    codigo_articulo: Option<String>,
    cod_barra_articulo: Option<String>,
    nombre_articulo: Option<String>,
    lista_precio_detalle: Option<Decimal>,
    lista_precio_mayorista: Option<Decimal>,
    lista_updated_at: Option<DateTime<Utc>>,
    fechas_vencimiento: Json<Vec<FechaVencimiento>>,
}

impl TryFrom<ProductoRow> for ProductoCompleto {
    type Error = AppError;

    fn try_from(row: ProductoRow) -> Result<Self, Self::Error> {
        let origen = row.origen.parse::<Origen>().map_err(AppError::Internal)?;

        Ok(ProductoCompleto {
            id: row.id,
            codigo: row.codigo,
            nombre: row.nombre,
            unidad: row.unidad,
            precio: row.precio,
            codigo_barra_interno: row.codigo_barra_interno,
            codigo_barra_externo: row.codigo_barra_externo,
            descripcion: row.descripcion,
            es_servicio: row.es_servicio,
            es_exento: row.es_exento,
            impuesto_especifico: row.impuesto_especifico,
            id_categoria: row.id_categoria,
            disponible_para_venta: row.disponible_para_venta,
            activo: row.activo,
            utilidad: row.utilidad,
            tipo_utilidad: row.tipo_utilidad,
            origen,
            codigo_final: row.codigo_final,
            codigo_pack: row.codigo_pack,
            nombre_pack: row.nombre_pack,
            precio_base: row.precio_base,
            cantidad_articulo: row.cantidad_articulo,
            codigo_articulo: row.codigo_articulo,
            cod_barra_articulo: row.cod_barra_articulo,
            nombre_articulo: row.nombre_articulo,
            lista_precio_detalle: row.lista_precio_detalle,
            lista_precio_mayorista: row.lista_precio_mayorista,
            lista_updated_at: row.lista_updated_at,
            fechas_vencimiento: row.fechas_vencimiento.0,
        })
    }
}

// Columnas comunes a las queries de `productos`
const PRODUCTO_SELECT: &str = r#"
    SELECT
        p.id,
        p.codigo,
        p.nombre,
        p.unidad,
        p.precio,
        p.codigo_barra_interno,
        p.codigo_barra_externo,
        p.descripcion,
        p.es_servicio,
        p.es_exento,
        p.impuesto_especifico,
        p.id_categoria,
        p.disponible_para_venta,
        p.activo,
        p.utilidad,
        p.tipo_utilidad,
        'producto' AS origen,
        p.codigo AS codigo_final,
        NULL::text AS codigo_pack,
        NULL::text AS nombre_pack,
        NULL::numeric AS precio_base,
        NULL::int4 AS cantidad_articulo,
        NULL::text AS codigo_articulo,
        NULL::text AS cod_barra_articulo,
        NULL::text AS nombre_articulo,
        lp.precio_detalle AS lista_precio_detalle,
        lp.precio_mayorista AS lista_precio_mayorista,
        lp.updated_at::timestamptz AS lista_updated_at,
        COALESCE(
            json_agg(json_build_object(
                'fecha_vencimiento', cvc.fecha_vencimiento,
                'cantidad', cvc.cantidad,
                'lote', cvc.lote
            )) FILTER (WHERE cvc.fecha_vencimiento IS NOT NULL),
            '[]'::json
        ) AS fechas_vencimiento
    FROM productos p
    LEFT JOIN lista_precios_cantera lp ON p.codigo = lp.codigo_tivendo
    LEFT JOIN control_vencimientos_cantera cvc ON p.codigo_barra_interno = cvc.codigo_barras
"#;

const PRODUCTO_GROUP_BY: &str = r#"
    GROUP BY
        p.id, p.codigo, p.nombre, p.unidad, p.precio, p.codigo_barra_interno,
        p.codigo_barra_externo, p.descripcion, p.es_servicio, p.es_exento,
        p.impuesto_especifico, p.id_categoria, p.disponible_para_venta,
        p.activo, p.utilidad, p.tipo_utilidad,
        lp.precio_detalle, lp.precio_mayorista, lp.updated_at
"#;

const PACK_QUERY: &str = r#"
    SELECT
        NULL::int4 AS id,
        pl.codigo_pack AS codigo,
        pl.nombre_pack AS nombre,
        NULL::text AS unidad,
        pl.precio_base AS precio,
        pl.cod_barra_pack AS codigo_barra_interno,
        pl.cod_barra_pack AS codigo_barra_externo,
        NULL::text AS descripcion,
        false AS es_servicio,
        false AS es_exento,
        NULL::numeric AS impuesto_especifico,
        NULL::int4 AS id_categoria,
        true AS disponible_para_venta,
        true AS activo,
        NULL::numeric AS utilidad,
        NULL::text AS tipo_utilidad,
        'pack' AS origen,
        pl.codigo_pack AS codigo_final,
        pl.codigo_pack,
        pl.nombre_pack,
        pl.precio_base,
        pl.cantidad_articulo,
        pl.codigo_articulo,
        pl.cod_barra_articulo,
        pl.nombre_articulo,
        lp.precio_detalle AS lista_precio_detalle,
        lp.precio_mayorista AS lista_precio_mayorista,
        lp.updated_at::timestamptz AS lista_updated_at,
        COALESCE(
            json_agg(json_build_object(
                'fecha_vencimiento', cvc.fecha_vencimiento,
                'cantidad', cvc.cantidad,
                'lote', cvc.lote
            )) FILTER (WHERE cvc.fecha_vencimiento IS NOT NULL),
            '[]'::json
        ) AS fechas_vencimiento
    FROM pack_listados pl
    LEFT JOIN lista_precios_cantera lp ON pl.codigo_pack = lp.codigo_tivendo
    LEFT JOIN control_vencimientos_cantera cvc ON pl.cod_barra_pack = cvc.codigo_barras
    WHERE pl.cod_barra_pack = $1 OR pl.codigo_pack = $1
    GROUP BY
        pl.codigo_pack, pl.nombre_pack, pl.precio_base, pl.cantidad_articulo,
        pl.codigo_articulo, pl.cod_barra_articulo, pl.nombre_articulo,
        pl.cod_barra_pack,
        lp.precio_detalle, lp.precio_mayorista, lp.updated_at
    LIMIT 1
"#;

const CATALOG_VERSION_QUERY: &str = r#"
    SELECT GREATEST(
        (SELECT MAX(updated_at) FROM productos),
        (SELECT MAX(updated_at) FROM pack_listados)
    )::timestamptz
"#;

const PRICE_LIST_VERSION_QUERY: &str =
    "SELECT MAX(updated_at)::timestamptz FROM lista_precios_cantera";

/// Implementación sobre PostgreSQL
pub struct PgProductRepository {
    pool: PgPool,
    query_timeout: Duration,
}

impl PgProductRepository {
    pub fn new(pool: PgPool, query_timeout: Duration) -> Self {
        Self {
            pool,
            query_timeout,
        }
    }

    /// Ejecuta una query con el timeout configurado
    async fn bounded<T, F>(&self, op: &'static str, fut: F) -> AppResult<T>
    where
        F: Future<Output = Result<T, sqlx::Error>>,
    {
        match tokio::time::timeout(self.query_timeout, fut).await {
            Ok(result) => result.map_err(AppError::from),
            Err(_) => Err(AppError::Database(sqlx::Error::Protocol(format!(
                "{} timed out after {:?}",
                op, self.query_timeout
            )))),
        }
    }

    async fn find_producto(&self, code: &str) -> AppResult<Option<ProductoRow>> {
        let query = format!(
            "{} WHERE p.codigo_barra_externo = $1 OR p.codigo_barra_interno = $1 {} LIMIT 1",
            PRODUCTO_SELECT, PRODUCTO_GROUP_BY
        );

        self.bounded(
            "get_producto_by_barcode",
            sqlx::query_as::<_, ProductoRow>(&query)
                .bind(code)
                .fetch_optional(&self.pool),
        )
        .await
    }

    async fn find_pack(&self, code: &str) -> AppResult<Option<ProductoRow>> {
        self.bounded(
            "get_pack_by_barcode",
            sqlx::query_as::<_, ProductoRow>(PACK_QUERY)
                .bind(code)
                .fetch_optional(&self.pool),
        )
        .await
    }
}

#[async_trait]
impl ProductRepository for PgProductRepository {
    async fn get_latest_version(&self, domain: VersionDomain) -> AppResult<Option<DateTime<Utc>>> {
        let query = match domain {
            VersionDomain::Productos => CATALOG_VERSION_QUERY,
            VersionDomain::ListaPrecios => PRICE_LIST_VERSION_QUERY,
        };

        self.bounded(
            "get_latest_version",
            sqlx::query_scalar::<_, Option<DateTime<Utc>>>(query).fetch_one(&self.pool),
        )
        .await
    }

    async fn get_record_by_code(&self, code: &str) -> AppResult<Option<ProductoCompleto>> {
        let start = Instant::now();

        // 1. Buscar en productos
        if let Some(row) = self.find_producto(code).await? {
            debug!(codigo_barras = %code, latency = ?start.elapsed(), "Producto encontrado en tabla productos");
            return row.try_into().map(Some);
        }

        // 2. Buscar en packs
        if let Some(row) = self.find_pack(code).await? {
            debug!(codigo_barras = %code, latency = ?start.elapsed(), "Pack encontrado en tabla pack_listados");
            return row.try_into().map(Some);
        }

        debug!(codigo_barras = %code, latency = ?start.elapsed(), "Producto/Pack no encontrado");
        Ok(None)
    }

    async fn get_frequent_products(&self, limit: i64) -> AppResult<Vec<ProductoCompleto>> {
        let query = format!(
            "{} WHERE p.activo = true AND p.disponible_para_venta = true {} ORDER BY p.nombre LIMIT $1",
            PRODUCTO_SELECT, PRODUCTO_GROUP_BY
        );

        let rows = self
            .bounded(
                "get_productos_frecuentes",
                sqlx::query_as::<_, ProductoRow>(&query)
                    .bind(limit)
                    .fetch_all(&self.pool),
            )
            .await?;

        rows.into_iter().map(ProductoCompleto::try_from).collect()
    }

    async fn ping(&self) -> AppResult<()> {
        self.bounded("ping", sqlx::query("SELECT 1").execute(&self.pool))
            .await
            .map(|_| ())
    }
}
