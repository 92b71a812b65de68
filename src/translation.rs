//! Key to localized string lookup for the two display languages.
//!
//! The table is deliberately small and lives in code: every user-facing label
//! passes through [translate] so that pages render fully in either language.

use serde::Deserialize;

/// A display language supported by the application.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lang {
    /// English.
    #[default]
    En,
    /// Arabic.
    Ar,
}

impl Lang {
    /// The BCP 47 language code, used for the `lang` attribute.
    pub fn code(self) -> &'static str {
        match self {
            Lang::En => "en",
            Lang::Ar => "ar",
        }
    }

    /// The text direction, used for the `dir` attribute.
    pub fn dir(self) -> &'static str {
        if self.is_rtl() { "rtl" } else { "ltr" }
    }

    /// Whether the language is written right-to-left.
    pub fn is_rtl(self) -> bool {
        matches!(self, Lang::Ar)
    }
}

/// Query parameters that select the display language.
#[derive(Debug, Default, Deserialize)]
pub struct LangQuery {
    /// The requested display language; defaults to English.
    #[serde(default)]
    pub lang: Lang,
}

/// Look up the localized string for `key`.
///
/// Unknown keys are echoed back unchanged so a missing entry shows up in the
/// rendered page instead of crashing the request.
pub fn translate(lang: Lang, key: &'static str) -> &'static str {
    let (en, ar) = match key {
        "balance.debt" => ("outstanding debt", "دين مستحق"),
        "balance.credit" => ("credit", "رصيد دائن"),
        "balance.settled" => ("settled", "مسدد"),
        "nav.dashboard" => ("Dashboard", "لوحة التحكم"),
        "nav.clients" => ("Clients", "العملاء"),
        "nav.log_out" => ("Log out", "تسجيل الخروج"),
        "page.dashboard" => ("Dashboard", "لوحة التحكم"),
        "page.clients" => ("Clients", "العملاء"),
        "page.log_in" => ("Log in", "تسجيل الدخول"),
        "page.not_found" => ("Page not found", "الصفحة غير موجودة"),
        "dashboard.totals" => ("Totals by currency", "الإجماليات حسب العملة"),
        "dashboard.debtors" => ("Clients with outstanding debt", "عملاء عليهم ديون مستحقة"),
        "clients.name" => ("Name", "الاسم"),
        "clients.balances" => ("Balances", "الأرصدة"),
        "clients.none" => ("No clients found.", "لا يوجد عملاء."),
        "client.entries" => ("Ledger entries", "قيود الدفتر"),
        "client.no_entries" => ("No entries recorded yet.", "لا توجد قيود مسجلة بعد."),
        "form.username" => ("Username", "اسم المستخدم"),
        "form.password" => ("Password", "كلمة المرور"),
        "form.amount" => ("Amount", "المبلغ"),
        "form.currency" => ("Currency", "العملة"),
        "form.description" => ("Description", "البيان"),
        "form.log_in" => ("Log in", "تسجيل الدخول"),
        "form.record_payment" => ("Record payment", "تسجيل دفعة"),
        "log_in.invalid" => (
            "Incorrect username or password.",
            "اسم المستخدم أو كلمة المرور غير صحيحة.",
        ),
        "log_in.internal_error" => (
            "An internal error occurred. Please try again later.",
            "حدث خطأ داخلي. حاول مرة أخرى لاحقًا.",
        ),
        other => (other, other),
    };

    match lang {
        Lang::En => en,
        Lang::Ar => ar,
    }
}
