//! Fixed Persian reply texts.

use pocketmed_core::profile::ProfileField;

pub const GREETING: &str = "سلام 👋\n\
من دستیار دیابت PocketMed هستم.\n\
سوال‌های مربوط به دیابت را بپرس؛ من یک توضیح کوتاه و آموزشی می‌دهم.\n\
یادت باشد: من جای پزشک را نمی‌گیرم.";

pub const NO_PROFILE: &str = "هنوز اطلاعاتی ثبت نشده.";

pub const GATEWAY_FAILURE: &str =
    "متأسفم، الان نمی‌توانم به سوالت پاسخ بدهم. لطفاً چند دقیقه بعد دوباره امتحان کن.";

pub const STORAGE_FAILURE: &str = "متأسفم، ذخیره اطلاعات انجام نشد. لطفاً دوباره امتحان کن.";

/// Confirmation after a field was written.
pub fn saved(field: ProfileField) -> &'static str {
    match field {
        ProfileField::Age => "سن ذخیره شد.",
        ProfileField::Gender => "جنس ذخیره شد.",
        ProfileField::DiabetesType => "نوع دیابت ذخیره شد.",
        ProfileField::DurationYears => "مدت ابتلا به دیابت ذخیره شد.",
        ProfileField::Medications => "داروها ذخیره شد.",
        ProfileField::OtherConditions => "بیماری‌های دیگر ذخیره شد.",
        ProfileField::LatestHba1c => "آخرین HbA1c ذخیره شد.",
    }
}

/// Human label of a field, used in correction prompts.
pub fn label(field: ProfileField) -> &'static str {
    match field {
        ProfileField::Age => "سن",
        ProfileField::Gender => "جنس",
        ProfileField::DiabetesType => "نوع دیابت",
        ProfileField::DurationYears => "مدت ابتلا به دیابت",
        ProfileField::Medications => "داروها",
        ProfileField::OtherConditions => "بیماری‌های دیگر",
        ProfileField::LatestHba1c => "HbA1c",
    }
}

fn example_value(field: ProfileField) -> &'static str {
    match field {
        ProfileField::Age => "65",
        ProfileField::DurationYears => "5",
        ProfileField::LatestHba1c => "7.2",
        _ => "...",
    }
}

/// Correction prompt for a value that could not be read. Names the field and,
/// when known, shows the expected form.
pub fn invalid_value(field: ProfileField, value: &str, keyword: Option<&str>) -> String {
    let mut text = format!("مقدار «{value}» برای {} معتبر نیست.", label(field));
    if let Some(keyword) = keyword {
        text.push_str(&format!(
            "\nلطفاً به این شکل بنویس: {keyword} {}",
            example_value(field)
        ));
    }
    text
}
