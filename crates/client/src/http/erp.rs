//! JSON-RPC ERP client.
//!
//! Speaks the ERP's `execute_kw` protocol: one POST endpoint, method routing
//! in the body, many2one references encoded as `[id, display_name]` pairs.
//! Raw rows are parsed into typed records here; nothing untyped leaves this
//! module.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use common::{ProductCode, Sku};
use domain::{BomLine, StockLevel};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::sync::Mutex;

use crate::error::{ClientError, Target};
use crate::http::{classify_status, classify_transport};

/// Connection settings for the ERP endpoint.
#[derive(Debug, Clone)]
pub struct ErpConfig {
    /// Full JSON-RPC URL, e.g. `http://erp:8069/jsonrpc`.
    pub url: String,
    pub database: String,
    pub username: String,
    pub password: String,
    /// Product field holding the SKU.
    pub sku_field: String,
    pub timeout: Duration,
}

impl Default for ErpConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8069/jsonrpc".to_string(),
            database: "erp".to_string(),
            username: "admin".to_string(),
            password: "admin".to_string(),
            sku_field: "default_code".to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'a str,
    method: &'a str,
    params: RpcParams<'a>,
    id: u32,
}

#[derive(Serialize)]
struct RpcParams<'a> {
    service: &'a str,
    method: &'a str,
    args: Value,
}

#[derive(Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcError>,
}

#[derive(Deserialize)]
struct RpcError {
    message: String,
}

/// Many2one reference: `[id, display_name]`.
#[derive(Debug, Deserialize)]
struct ManyRef(i64, #[allow(dead_code)] String);

#[derive(Debug, Deserialize)]
struct BomLineRow {
    product_id: ManyRef,
    product_qty: f64,
}

#[derive(Debug, Deserialize)]
struct QuantRow {
    product_id: ManyRef,
    location_id: ManyRef,
    quantity: f64,
    #[serde(default)]
    reserved_quantity: f64,
}

/// HTTP implementation of [`crate::ErpClient`].
pub struct HttpErpClient {
    config: ErpConfig,
    http: reqwest::Client,
    uid: Mutex<Option<i64>>,
}

impl HttpErpClient {
    pub fn new(config: ErpConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .expect("reqwest client construction cannot fail with static options");
        Self {
            config,
            http,
            uid: Mutex::new(None),
        }
    }

    async fn rpc(&self, service: &str, method: &str, args: Value) -> Result<Value, ClientError> {
        let request = RpcRequest {
            jsonrpc: "2.0",
            method: "call",
            params: RpcParams {
                service,
                method,
                args,
            },
            id: 1,
        };

        let response = self
            .http
            .post(&self.config.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| classify_transport(Target::Erp, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(Target::Erp, status, &body));
        }

        let parsed: RpcResponse = response
            .json()
            .await
            .map_err(|e| classify_transport(Target::Erp, e))?;

        if let Some(error) = parsed.error {
            return Err(ClientError::permanent(
                Target::Erp,
                format!("RPC error: {}", error.message),
            ));
        }
        Ok(parsed.result.unwrap_or(Value::Null))
    }

    async fn authenticate(&self) -> Result<i64, ClientError> {
        let result = self
            .rpc(
                "common",
                "authenticate",
                json!([
                    self.config.database,
                    self.config.username,
                    self.config.password,
                    {}
                ]),
            )
            .await?;

        result.as_i64().ok_or_else(|| {
            ClientError::permanent(Target::Erp, "authentication rejected by ERP")
        })
    }

    async fn uid(&self) -> Result<i64, ClientError> {
        let mut uid = self.uid.lock().await;
        if let Some(existing) = *uid {
            return Ok(existing);
        }
        let fresh = self.authenticate().await?;
        tracing::info!(uid = fresh, "authenticated with ERP");
        *uid = Some(fresh);
        Ok(fresh)
    }

    async fn execute_kw(
        &self,
        model: &str,
        method: &str,
        args: Value,
        kwargs: Value,
    ) -> Result<Value, ClientError> {
        let uid = self.uid().await?;
        self.rpc(
            "object",
            "execute_kw",
            json!([
                self.config.database,
                uid,
                self.config.password,
                model,
                method,
                args,
                kwargs
            ]),
        )
        .await
    }

    async fn search_read(
        &self,
        model: &str,
        domain: Value,
        fields: &[&str],
    ) -> Result<Vec<Value>, ClientError> {
        let result = self
            .execute_kw(model, "search_read", json!([domain]), json!({ "fields": fields }))
            .await?;
        result.as_array().cloned().ok_or_else(|| {
            ClientError::permanent(Target::Erp, format!("{model} search_read: not an array"))
        })
    }

    fn parse_rows<T: serde::de::DeserializeOwned>(
        model: &str,
        rows: Vec<Value>,
    ) -> Result<Vec<T>, ClientError> {
        rows.into_iter()
            .map(|row| {
                serde_json::from_value(row).map_err(|e| {
                    ClientError::permanent(Target::Erp, format!("malformed {model} row: {e}"))
                })
            })
            .collect()
    }

    fn sku_of(&self, row: &Value) -> Option<Sku> {
        row.get(self.config.sku_field.as_str())
            .and_then(Value::as_str)
            .map(Sku::new)
    }

    /// Maps product ids to SKUs for the given rows; rows without a SKU are
    /// rejected rather than silently dropped.
    fn sku_map(&self, rows: &[Value]) -> Result<HashMap<i64, Sku>, ClientError> {
        rows.iter()
            .map(|row| {
                let id = row.get("id").and_then(Value::as_i64).ok_or_else(|| {
                    ClientError::permanent(Target::Erp, "product row without id")
                })?;
                let sku = self.sku_of(row).ok_or_else(|| {
                    ClientError::permanent(Target::Erp, format!("product {id} has no SKU"))
                })?;
                Ok((id, sku))
            })
            .collect()
    }
}

#[async_trait]
impl crate::erp::ErpClient for HttpErpClient {
    async fn fetch_bom(&self, product_code: &ProductCode) -> Result<Vec<BomLine>, ClientError> {
        let sku_field = self.config.sku_field.as_str();

        let products = self
            .search_read(
                "product.product",
                json!([[sku_field, "=", product_code.as_str()]]),
                &["id", "name", sku_field],
            )
            .await?;
        let Some(product_id) = products.first().and_then(|p| p.get("id")).and_then(Value::as_i64)
        else {
            return Ok(Vec::new());
        };

        let boms = self
            .search_read(
                "mrp.bom",
                json!([["product_id", "=", product_id]]),
                &["id", "bom_line_ids"],
            )
            .await?;
        let line_ids: Vec<i64> = boms
            .first()
            .and_then(|b| b.get("bom_line_ids"))
            .and_then(Value::as_array)
            .map(|ids| ids.iter().filter_map(Value::as_i64).collect())
            .unwrap_or_default();
        if line_ids.is_empty() {
            return Ok(Vec::new());
        }

        let raw_lines = self
            .execute_kw(
                "mrp.bom.line",
                "read",
                json!([line_ids]),
                json!({ "fields": ["id", "product_id", "product_qty"] }),
            )
            .await?
            .as_array()
            .cloned()
            .ok_or_else(|| {
                ClientError::permanent(Target::Erp, "mrp.bom.line read: not an array")
            })?;
        let rows: Vec<BomLineRow> = Self::parse_rows("mrp.bom.line", raw_lines)?;

        let component_ids: Vec<i64> = rows.iter().map(|r| r.product_id.0).collect();
        let components = self
            .search_read(
                "product.product",
                json!([["id", "in", component_ids]]),
                &["id", sku_field],
            )
            .await?;
        let skus = self.sku_map(&components)?;

        rows.into_iter()
            .map(|row| {
                let sku = skus.get(&row.product_id.0).cloned().ok_or_else(|| {
                    ClientError::permanent(
                        Target::Erp,
                        format!("BOM line references unknown product {}", row.product_id.0),
                    )
                })?;
                Ok(BomLine {
                    sku,
                    qty_per_unit: row.product_qty,
                    product_code: product_code.clone(),
                })
            })
            .collect()
    }

    async fn fetch_stock(
        &self,
        skus: &[Sku],
        locations: &[String],
    ) -> Result<Vec<StockLevel>, ClientError> {
        if skus.is_empty() {
            return Ok(Vec::new());
        }
        let sku_field = self.config.sku_field.as_str();
        let sku_strs: Vec<&str> = skus.iter().map(Sku::as_str).collect();

        let products = self
            .search_read(
                "product.product",
                json!([[sku_field, "in", sku_strs]]),
                &["id", sku_field],
            )
            .await?;
        let sku_by_id = self.sku_map(&products)?;
        let ids: Vec<i64> = sku_by_id.keys().copied().collect();
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let raw_quants = self
            .search_read(
                "stock.quant",
                json!([
                    ["product_id", "in", ids],
                    ["location_id.usage", "=", "internal"]
                ]),
                &["product_id", "location_id", "quantity", "reserved_quantity"],
            )
            .await?;
        let quants: Vec<QuantRow> = Self::parse_rows("stock.quant", raw_quants)?;

        Ok(quants
            .into_iter()
            .filter_map(|quant| {
                let location = quant.location_id.1.clone();
                if !locations.contains(&location) {
                    return None;
                }
                let sku = sku_by_id.get(&quant.product_id.0)?.clone();
                Some(StockLevel {
                    sku,
                    available: quant.quantity - quant.reserved_quantity,
                    location,
                })
            })
            .collect())
    }
}
