//! 错误种类与稳定错误码
//!
//! 所有对外可见的数字错误码都定义在这里，取值范围 17000–20999。
//! 一旦发布，编码和名称都不能再改动：客户端和账本中的历史记录都依赖它们。

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};

/// 错误分类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum ErrorCategory {
    /// 未知错误或系统级故障
    System,
    /// 配置读取或安装问题
    Configuration,
    /// 输入数据校验、匹配失败
    Validation,
    /// 解析或认证失败
    ParsingAuth,
    /// 表存储故障
    Storage,
    /// 外部 Web 服务调用失败
    ExternalWeb,
    /// 调用次数限制
    RateLimit,
    /// 非错误的提示信息
    Informational,
}

/// 错误种类
///
/// `Display`/`name()` 输出稳定的大写标识（如 `EXP_NOMATCH`），
/// 账本消息前缀和诊断映射中的 `Code` 字段都使用它。
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    IntoStaticStr,
)]
#[repr(i32)]
pub enum ErrorKind {
    /// 成功哨兵值，不是错误
    #[strum(serialize = "EXP_OK")]
    #[serde(rename = "EXP_OK")]
    Ok = 0,

    // ========== 未知/系统 ==========
    #[strum(serialize = "EXP_UNKNOWN")]
    #[serde(rename = "EXP_UNKNOWN")]
    Unknown = 17000,

    // ========== 配置 ==========
    #[strum(serialize = "EXP_CONFIG")]
    #[serde(rename = "EXP_CONFIG")]
    Config = 17001,

    // ========== 校验/数据匹配 ==========
    #[strum(serialize = "EXP_NOMATCH")]
    #[serde(rename = "EXP_NOMATCH")]
    NoMatch = 17002,
    #[strum(serialize = "EXP_REQFIELD")]
    #[serde(rename = "EXP_REQFIELD")]
    RequiredField = 17003,
    #[strum(serialize = "EXP_NODATA")]
    #[serde(rename = "EXP_NODATA")]
    NoData = 17004,
    #[strum(serialize = "EXP_DUPDATA")]
    #[serde(rename = "EXP_DUPDATA")]
    DuplicateData = 17005,
    #[strum(serialize = "EXP_OUTRANGE")]
    #[serde(rename = "EXP_OUTRANGE")]
    OutOfRange = 17006,
    #[strum(serialize = "EXP_NOT_ALLOWED")]
    #[serde(rename = "EXP_NOT_ALLOWED")]
    NotAllowed = 17007,
    #[strum(serialize = "EXP_TRANS")]
    #[serde(rename = "EXP_TRANS")]
    Transaction = 17008,
    #[strum(serialize = "EXP_PREG")]
    #[serde(rename = "EXP_PREG")]
    PreRegistration = 17009,
    #[strum(serialize = "EXP_EXPIRED")]
    #[serde(rename = "EXP_EXPIRED")]
    Expired = 17010,

    // ========== 解析/认证 ==========
    #[strum(serialize = "EXP_PARSE_FAIL")]
    #[serde(rename = "EXP_PARSE_FAIL")]
    ParseFail = 17011,
    #[strum(serialize = "EXP_AUTH_FAIL")]
    #[serde(rename = "EXP_AUTH_FAIL")]
    AuthFail = 17012,

    #[strum(serialize = "EXP_NOREF")]
    #[serde(rename = "EXP_NOREF")]
    NoReference = 17017,

    // ========== 调用限制 ==========
    #[strum(serialize = "EXP_MAX_CALLS")]
    #[serde(rename = "EXP_MAX_CALLS")]
    MaxCalls = 17101,

    // ========== 表存储 ==========
    #[strum(serialize = "EXP_TS_FAIL")]
    #[serde(rename = "EXP_TS_FAIL")]
    TableStorageFail = 17201,
    #[strum(serialize = "EXP_TS_SIZE")]
    #[serde(rename = "EXP_TS_SIZE")]
    TableStorageSize = 17202,

    // ========== 外部 Web 服务 ==========
    #[strum(serialize = "EXP_WEB_GEN")]
    #[serde(rename = "EXP_WEB_GEN")]
    WebGeneral = 17301,
    #[strum(serialize = "EXP_WEB_NOMATCH")]
    #[serde(rename = "EXP_WEB_NOMATCH")]
    WebNoMatch = 17302,
    #[strum(serialize = "EXP_WEB_ALTKEY")]
    #[serde(rename = "EXP_WEB_ALTKEY")]
    WebAltKey = 17303,
    #[strum(serialize = "EXP_WEB_NODATA")]
    #[serde(rename = "EXP_WEB_NODATA")]
    WebNoData = 17304,

    #[strum(serialize = "EXP_API_LIMIT")]
    #[serde(rename = "EXP_API_LIMIT")]
    ApiLimit = 17400,

    #[strum(serialize = "EXP_SYS_DBDOWN")]
    #[serde(rename = "EXP_SYS_DBDOWN")]
    DatabaseDown = 17500,

    // ========== 提示信息（非错误） ==========
    #[strum(serialize = "HLP_INITALIZED")]
    #[serde(rename = "HLP_INITALIZED")]
    Initialized = 20100,
    #[strum(serialize = "HLP_WORKED")]
    #[serde(rename = "HLP_WORKED")]
    Worked = 20110,
}

impl ErrorKind {
    /// 稳定的数字错误码
    pub fn code(self) -> i32 {
        self as i32
    }

    /// 稳定的大写名称
    pub fn name(self) -> &'static str {
        self.into()
    }

    /// 根据数字错误码查找错误种类
    pub fn from_code(code: i32) -> Option<Self> {
        Self::iter().find(|kind| kind.code() == code)
    }

    /// 所属分类
    pub fn category(self) -> ErrorCategory {
        match self {
            Self::Unknown | Self::DatabaseDown => ErrorCategory::System,
            Self::Config | Self::NoReference => ErrorCategory::Configuration,
            Self::NoMatch
            | Self::RequiredField
            | Self::NoData
            | Self::DuplicateData
            | Self::OutOfRange
            | Self::NotAllowed
            | Self::Transaction
            | Self::PreRegistration
            | Self::Expired => ErrorCategory::Validation,
            Self::ParseFail | Self::AuthFail => ErrorCategory::ParsingAuth,
            Self::TableStorageFail | Self::TableStorageSize => ErrorCategory::Storage,
            Self::WebGeneral | Self::WebNoMatch | Self::WebAltKey | Self::WebNoData => {
                ErrorCategory::ExternalWeb
            }
            Self::MaxCalls | Self::ApiLimit => ErrorCategory::RateLimit,
            Self::Ok | Self::Initialized | Self::Worked => ErrorCategory::Informational,
        }
    }

    /// 是否为真正的错误（成功哨兵和提示信息不算）
    pub fn is_error(self) -> bool {
        self.category() != ErrorCategory::Informational
    }
}
