use std::collections::HashMap;

/// 简单注册扩展（Simple Registration 1.1）
pub const SREG_NS: &str = "http://openid.net/extensions/sreg/1.1";

/// 向提供方索要资料属性的请求
#[derive(Debug, Clone, Default)]
pub struct SregRequest {
    pub required: Vec<String>,
    pub optional: Vec<String>,
}

impl SregRequest {
    pub fn required(fields: &[&str]) -> Self {
        Self {
            required: fields.iter().map(|f| f.to_string()).collect(),
            optional: Vec::new(),
        }
    }

    /// 附加到认证请求上的查询参数
    pub fn params(&self) -> Vec<(String, String)> {
        let mut params = vec![("openid.ns.sreg".to_string(), SREG_NS.to_string())];
        if !self.required.is_empty() {
            params.push(("openid.sreg.required".to_string(), self.required.join(",")));
        }
        if !self.optional.is_empty() {
            params.push(("openid.sreg.optional".to_string(), self.optional.join(",")));
        }
        params
    }
}

/// 从回调参数里取出资料属性；提供方没发时得到空映射
pub fn extract(params: &HashMap<String, String>) -> HashMap<String, String> {
    params
        .iter()
        .filter_map(|(key, value)| {
            key.strip_prefix("openid.sreg.")
                .filter(|field| *field != "required" && *field != "optional")
                .map(|field| (field.to_string(), value.clone()))
        })
        .collect()
}
