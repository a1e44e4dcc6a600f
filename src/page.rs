use crate::error::AppError;
use crate::model::TargetData;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use utoipa::{IntoParams, ToSchema};

pub const DEFAULT_LIMIT: usize = 20;
pub const MAX_LIMIT: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub enum FilterOp<T> {
    Eq(T),
    Ne(T),
    Lt(T),
    Le(T),
    Gt(T),
    Ge(T),
    In(Vec<T>),
}

impl FilterOp<Value> {
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            FilterOp::Eq(expected) => value == expected,
            FilterOp::Ne(expected) => value != expected,
            FilterOp::Lt(expected) => json_cmp(value, expected) == Ordering::Less,
            FilterOp::Le(expected) => json_cmp(value, expected) != Ordering::Greater,
            FilterOp::Gt(expected) => json_cmp(value, expected) == Ordering::Greater,
            FilterOp::Ge(expected) => json_cmp(value, expected) != Ordering::Less,
            FilterOp::In(options) => options.contains(value),
        }
    }
}

/// One filter condition on a column property; conditions are ANDed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Filter {
    pub property: String,
    pub op: FilterOp<Value>,
}

impl Filter {
    /// Parses the wire form `property:op:value`, e.g. `login:eq:alice` or
    /// `age:in:30,40`. The value is read as JSON when it parses as such,
    /// otherwise taken as a string literal.
    pub fn parse(raw: &str) -> Result<Filter, AppError> {
        let mut parts = raw.splitn(3, ':');
        let (property, op_name, value) = match (parts.next(), parts.next(), parts.next()) {
            (Some(p), Some(o), Some(v)) if !p.is_empty() => (p, o, v),
            _ => return Err(AppError::BadRequest(format!("invalid filter '{}', expected property:op:value", raw))),
        };
        let op = match op_name {
            "eq" => FilterOp::Eq(parse_value(value)),
            "ne" => FilterOp::Ne(parse_value(value)),
            "lt" => FilterOp::Lt(parse_value(value)),
            "le" => FilterOp::Le(parse_value(value)),
            "gt" => FilterOp::Gt(parse_value(value)),
            "ge" => FilterOp::Ge(parse_value(value)),
            "in" => FilterOp::In(value.split(',').map(parse_value).collect()),
            other => return Err(AppError::BadRequest(format!("unknown filter op '{}'", other))),
        };
        Ok(Filter { property: property.to_string(), op })
    }

    pub fn matches(&self, record: &crate::model::Record) -> bool {
        let value = record.get(&self.property).unwrap_or(&Value::Null);
        self.op.matches(value)
    }
}

fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

/// Total ordering over JSON values so any column can be sorted and
/// range-filtered: null < bool < number < string < array < object.
pub fn json_cmp(a: &Value, b: &Value) -> Ordering {
    fn rank(v: &Value) -> u8 {
        match v {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            Value::Array(_) => 4,
            Value::Object(_) => 5,
        }
    }
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            // integers compare exactly, f64 only for fractional operands
            if let (Some(x), Some(y)) = (x.as_i64(), y.as_i64()) {
                x.cmp(&y)
            } else if let (Some(x), Some(y)) = (x.as_u64(), y.as_u64()) {
                x.cmp(&y)
            } else {
                let (x, y) = (x.as_f64().unwrap_or(f64::NAN), y.as_f64().unwrap_or(f64::NAN));
                x.partial_cmp(&y).unwrap_or(Ordering::Equal)
            }
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

/// Raw listing parameters as they arrive from the caller.
#[derive(Debug, Clone, Default, Serialize, Deserialize, IntoParams)]
pub struct PageParams {
    #[param(example = 20)]
    pub limit: Option<usize>,
    #[param(example = 1)]
    pub page: Option<usize>,
    pub sort: Option<String>,
    pub order: Option<SortOrder>,
    /// `property:op:value` conditions, `;`-separated and ANDed together.
    pub filter: Option<String>,
}

/// Parameters after defaulting and clamping against a resolved target.
#[derive(Debug, Clone, PartialEq)]
pub struct QuerySpec {
    pub sort: String,
    pub order: SortOrder,
    pub offset: usize,
    pub limit: usize,
    pub filters: Vec<Filter>,
}

impl PageParams {
    /// Applies the defaults: limit 20 in [1, 1000], page ≥ 1, sort by the
    /// primary column, descending.
    pub fn normalize(&self, data: &TargetData) -> Result<(QuerySpec, usize), AppError> {
        let limit = self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
        let page = self.page.unwrap_or(1).max(1);
        let sort = self
            .sort
            .clone()
            .unwrap_or_else(|| data.primary_property().to_string());
        let order = self.order.unwrap_or_default();
        let mut filters = Vec::new();
        if let Some(raw_filters) = &self.filter {
            for raw in raw_filters.split(';').filter(|s| !s.is_empty()) {
                filters.push(Filter::parse(raw)?);
            }
        }
        let spec = QuerySpec { sort, order, offset: (page - 1).saturating_mul(limit), limit, filters };
        Ok((spec, page))
    }
}

/// One page of records plus the pagination envelope.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total_count: u64,
    pub current_page: usize,
    pub page_size: usize,
}
