//! MQTT 主题集合。
//!
//! 三个逻辑目的地在进程生命周期内固定：
//!
//! ```text
//! outbound        SiteWhere/{tenant}/input/protobuf
//! inbound-system  SiteWhere/{tenant}/system/{device}
//! inbound-command SiteWhere/{tenant}/command/{device}
//! ```

/// 出站事件默认主题。
pub fn default_outbound_topic(tenant: &str) -> String {
    format!("SiteWhere/{}/input/protobuf", tenant)
}

/// 入站系统命令默认主题。
pub fn default_inbound_system_topic(tenant: &str, device_token: &str) -> String {
    format!("SiteWhere/{}/system/{}", tenant, device_token)
}

/// 入站设备类型命令默认主题。
pub fn default_inbound_command_topic(tenant: &str, device_token: &str) -> String {
    format!("SiteWhere/{}/command/{}", tenant, device_token)
}

/// 已解析的主题集合（启动后只读）。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicSet {
    pub outbound: String,
    pub inbound_system: String,
    pub inbound_command: String,
}

impl TopicSet {
    /// 按租户与设备 token 推导全部默认主题。
    pub fn defaults(tenant: &str, device_token: &str) -> Self {
        Self {
            outbound: default_outbound_topic(tenant),
            inbound_system: default_inbound_system_topic(tenant, device_token),
            inbound_command: default_inbound_command_topic(tenant, device_token),
        }
    }
}
