//! 错误种类的本地化描述

use super::ErrorKind;
use serde::{Deserialize, Serialize};

/// 找不到对应描述时的回退文本
pub const NO_DESCRIPTION: &str = "No matching description for error.";

/// 通用错误消息，同时用作安全视图中的固定消息
pub const GENERIC_ERROR_MESSAGE: &str = "Unknown or System generated error.";

/// 描述文本使用的语言
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Locale {
    /// 美式英语
    #[default]
    AmericanEnglish,
}

/// 返回错误种类在指定语言下的描述
///
/// 没有对应文本的种类返回 [`NO_DESCRIPTION`]，新增种类可以先于描述发布。
pub fn describe(kind: ErrorKind, locale: Locale) -> &'static str {
    let text = match locale {
        Locale::AmericanEnglish => american_english(kind),
    };
    text.unwrap_or(NO_DESCRIPTION)
}

fn american_english(kind: ErrorKind) -> Option<&'static str> {
    let text = match kind {
        ErrorKind::Unknown => GENERIC_ERROR_MESSAGE,
        ErrorKind::Config => {
            "There was a problem reading some parameters from the configuration file."
        }
        ErrorKind::NoMatch => "An expected match was not found in the data.",
        ErrorKind::RequiredField => "A required field is missing data.",
        ErrorKind::NoData => {
            "The data requested does not seem to be available, please recheck the input values."
        }
        ErrorKind::DuplicateData => {
            "The data to be created or changed already exists in the system and does not allow duplicate entries."
        }
        ErrorKind::OutOfRange => {
            "The input data is outside the range of allowable values or is too large to be processed by the system."
        }
        ErrorKind::NotAllowed => "The action is not allowed for this customer.",
        ErrorKind::Transaction => {
            "Unable to perform all the actions needed to complete the transaction."
        }
        ErrorKind::PreRegistration => {
            "Please properly register the application before using the services."
        }
        ErrorKind::Expired => "The data has expired and cannot be used.",
        ErrorKind::ParseFail => "The input data failed to parse into something usable.",
        ErrorKind::AuthFail => "The credentials supplied do not match any on record.",
        ErrorKind::NoReference => {
            "The Reference Table requested does not exist.  Check that the application was installed correctly."
        }
        ErrorKind::MaxCalls => "Maximum allowed calls to the Web Service exceeded.",
        ErrorKind::TableStorageFail => "Table Storage unable to process request.",
        ErrorKind::TableStorageSize => "Table Storage unable to store data, it is too large.",
        ErrorKind::WebGeneral => "The Web Request to the external web service failed.",
        ErrorKind::WebNoMatch => "The Web Request query found no match.",
        ErrorKind::WebAltKey => "The Web Request used an alternate key.",
        ErrorKind::WebNoData => "The Web Request returned less data than expected.",
        ErrorKind::ApiLimit => "The API limit for this invocation exceeded.",
        ErrorKind::DatabaseDown => "The Database is not currently responding.",
        ErrorKind::Ok | ErrorKind::Initialized | ErrorKind::Worked => return None,
    };
    Some(text)
}
