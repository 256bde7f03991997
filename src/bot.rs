//! Transport-independent command handling.
//!
//! [`Bot::handle`] turns one incoming request into at most one reply. It owns
//! the current dataset snapshot and the allow-list, and never talks to the
//! network except through the [`DatasetSource`] on `/reload`.

use tracing::{debug, error, info, instrument, warn};

use crate::access::{AccessControl, AddOutcome};
use crate::aggregate;
use crate::io::users::{UserId, UserStore};
use crate::model::Dataset;
use crate::query::{self, QueryError};
use crate::report;
use crate::source::DatasetSource;

/// Callback payload attached to the button sent with `/start`.
pub const MAKE_QUERY: &str = "make_query";

const QUERY_HINT: &str =
    "📌 Введіть запит:\n➔ Артикул (3364150) чи VRP350/VRP 350/VRP-350, січень-грудень 2024";
const NO_RIGHTS: &str = "⛔ У вас немає прав на цю команду.";
const NO_ACCESS: &str = "⛔ У вас немає доступу до цього бота.";
const ADMIN_USAGE: &str = "⚙️ Формат:\n/admin add 123456789";

/// What the user sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Incoming {
    /// Slash command with whitespace-separated arguments.
    Command { name: String, args: Vec<String> },
    /// Free text, interpreted as a lookup.
    Text(String),
    /// Inline button press.
    Callback(String),
}

impl Incoming {
    /// Classifies message text. Commands addressed as `/cmd@botname` lose the
    /// bot name.
    pub fn from_text(text: &str) -> Self {
        let Some(command) = text.trim_start().strip_prefix('/') else {
            return Incoming::Text(text.to_string());
        };
        let mut parts = command.split_whitespace();
        let name = parts.next().unwrap_or_default();
        let name = name.split('@').next().unwrap_or_default().to_lowercase();
        Incoming::Command {
            name,
            args: parts.map(str::to_string).collect(),
        }
    }
}

/// One request from one user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub user: UserId,
    pub first_name: String,
    pub input: Incoming,
}

/// How the transport should render a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Plain,
    Html,
}

/// Inline button with a callback payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub label: String,
    pub callback: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    pub format: Format,
    pub button: Option<Button>,
}

impl Reply {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            format: Format::Plain,
            button: None,
        }
    }

    pub fn html(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            format: Format::Html,
            button: None,
        }
    }

    fn with_button(mut self, label: &str, callback: &str) -> Self {
        self.button = Some(Button {
            label: label.to_string(),
            callback: callback.to_string(),
        });
        self
    }
}

/// Request dispatcher holding the process state.
pub struct Bot<S, D> {
    access: AccessControl<S>,
    source: D,
    dataset: Dataset,
}

impl<S: UserStore, D: DatasetSource> Bot<S, D> {
    /// Creates a dispatcher around an already loaded dataset.
    pub fn new(access: AccessControl<S>, source: D, dataset: Dataset) -> Self {
        Self {
            access,
            source,
            dataset,
        }
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    pub fn access(&self) -> &AccessControl<S> {
        &self.access
    }

    /// Handles one request. `None` means the request is ignored.
    #[instrument(level = "debug", skip_all, fields(user = request.user))]
    pub fn handle(&mut self, request: &Request) -> Option<Reply> {
        match &request.input {
            Incoming::Command { name, args } => self.command(request, name, args),
            Incoming::Text(text) => Some(self.lookup(request.user, text)),
            Incoming::Callback(data) if data == MAKE_QUERY => Some(Reply::plain(QUERY_HINT)),
            Incoming::Callback(data) => {
                debug!(%data, "ignoring unknown callback");
                None
            }
        }
    }

    fn command(&mut self, request: &Request, name: &str, args: &[String]) -> Option<Reply> {
        let user = request.user;
        let reply = match name {
            "start" => Reply::plain(format!(
                "👋 Привіт, {}!\nВаш Telegram ID: {user}",
                request.first_name
            ))
            .with_button("🔎 Зробити запит", MAKE_QUERY),
            "id" => Reply::plain(format!("Ваш Telegram ID: {user}")),
            "help" => Reply::plain(QUERY_HINT),
            "users" => self.list_users(user),
            "admin" => self.admin(user, args),
            "reload" => self.reload(user),
            other => {
                debug!(command = other, "ignoring unknown command");
                return None;
            }
        };
        Some(reply)
    }

    fn list_users(&self, user: UserId) -> Reply {
        if !self.access.is_admin(user) {
            return Reply::plain(NO_RIGHTS);
        }
        let users = self.access.users();
        if users.is_empty() {
            return Reply::plain("👥 Список дозволених ID порожній.");
        }
        let ids: Vec<String> = users.iter().map(UserId::to_string).collect();
        Reply::plain(format!("👥 Список дозволених ID:\n{}", ids.join("\n")))
    }

    fn admin(&mut self, user: UserId, args: &[String]) -> Reply {
        if !self.access.is_admin(user) {
            warn!(user, "admin command from non-admin");
            return Reply::plain(NO_RIGHTS);
        }
        let [action, id] = args else {
            return Reply::plain(ADMIN_USAGE);
        };
        if action != "add" {
            return Reply::plain(ADMIN_USAGE);
        }
        let Ok(new_user) = id.parse::<UserId>() else {
            return Reply::plain("❗ ID має бути числом.");
        };
        match self.access.add(new_user) {
            Ok(AddOutcome::Added) => Reply::plain(format!("✅ Користувача {new_user} додано.")),
            Ok(AddOutcome::AlreadyPresent) => {
                Reply::plain(format!("ℹ️ Користувач {new_user} вже є."))
            }
            Err(err) => {
                error!(error = %err, new_user, "failed to persist allow-list");
                Reply::plain(format!(
                    "❗ Не вдалося зберегти список користувачів: {err}"
                ))
            }
        }
    }

    fn reload(&mut self, user: UserId) -> Reply {
        if !self.access.is_admin(user) {
            return Reply::plain(NO_RIGHTS);
        }
        match self.source.load() {
            Ok(dataset) => {
                info!(sheets = dataset.len(), rows = dataset.row_count(), "dataset reloaded");
                let sheets = dataset.len();
                self.dataset = dataset;
                Reply::plain(format!("🔄 Дані оновлено. Аркушів: {sheets}."))
            }
            Err(err) => {
                error!(error = %err, "dataset reload failed, keeping previous snapshot");
                Reply::plain(format!("❗ Не вдалося оновити дані: {err}"))
            }
        }
    }

    fn lookup(&self, user: UserId, text: &str) -> Reply {
        if !self.access.is_allowed(user) {
            info!(user, "lookup denied");
            return Reply::plain(NO_ACCESS);
        }

        let query = match query::parse(text) {
            Ok(query) => query,
            Err(QueryError::UnknownMonth { .. }) => {
                return Reply::plain("Не вдалося розпізнати місяці.");
            }
            Err(QueryError::InvalidYear(year)) => {
                return Reply::plain(format!("Не вдалося розпізнати рік {year}."));
            }
            Err(QueryError::NoCodes) => {
                return Reply::plain(format!("❗ Не вказано артикул.\n{QUERY_HINT}"));
            }
        };

        let mut summaries = aggregate::summarize(&self.dataset, &query);
        if summaries.is_empty() {
            let text = if query.period.is_some() {
                "Продажів за вказаний період не знайдено."
            } else {
                "Продажів не знайдено."
            };
            return Reply::plain(text);
        }

        report::rank(&mut summaries);
        Reply::html(report::render(&summaries, query.period))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Result, ToolError};
    use crate::io::users::MemoryStore;
    use crate::model::{Row, Sheet};
    use crate::source::StaticSource;
    use chrono::NaiveDate;

    const ADMIN: UserId = 1;
    const MEMBER: UserId = 2;
    const STRANGER: UserId = 3;

    fn request(user: UserId, text: &str) -> Request {
        Request {
            user,
            first_name: "Олена".into(),
            input: Incoming::from_text(text),
        }
    }

    fn dataset() -> Dataset {
        let jan = NaiveDate::from_ymd_opt(2024, 1, 10).unwrap();
        Dataset::new(vec![
            Sheet::new(
                "B-Supplier",
                vec![Row::new("CODE 1").issued(jan).quantity(5.0).price(2.0)],
            ),
            Sheet::new(
                "A-Supplier",
                vec![Row::new("code-1").issued(jan).quantity(10.0).price(3.0)],
            ),
        ])
    }

    fn bot(store: &MemoryStore) -> Bot<&MemoryStore, StaticSource> {
        let access = AccessControl::new(ADMIN, store).expect("allow-list");
        Bot::new(access, StaticSource(dataset()), dataset())
    }

    struct BrokenSource;

    impl DatasetSource for BrokenSource {
        fn load(&self) -> Result<Dataset> {
            Err(ToolError::Fetch {
                url: "https://example.invalid".into(),
                status: 404,
            })
        }
    }

    #[test]
    fn classifies_commands_and_text() {
        assert_eq!(
            Incoming::from_text("/admin@PriceBot add 42"),
            Incoming::Command {
                name: "admin".into(),
                args: vec!["add".into(), "42".into()]
            }
        );
        assert_eq!(
            Incoming::from_text("VRP 350"),
            Incoming::Text("VRP 350".into())
        );
    }

    #[test]
    fn start_greets_with_id_and_button() {
        let store = MemoryStore::default();
        let reply = bot(&store).handle(&request(STRANGER, "/start")).expect("reply");
        assert_eq!(reply.text, "👋 Привіт, Олена!\nВаш Telegram ID: 3");
        assert_eq!(reply.button.map(|b| b.callback), Some(MAKE_QUERY.to_string()));
    }

    #[test]
    fn id_echoes_caller() {
        let store = MemoryStore::default();
        let reply = bot(&store).handle(&request(42, "/id")).expect("reply");
        assert_eq!(reply.text, "Ваш Telegram ID: 42");
    }

    #[test]
    fn stranger_lookup_is_denied() {
        let store = MemoryStore::new(vec![MEMBER]);
        let reply = bot(&store).handle(&request(STRANGER, "code1")).expect("reply");
        assert_eq!(reply.text, NO_ACCESS);
        assert_eq!(reply.format, Format::Plain);
    }

    #[test]
    fn member_lookup_ranks_by_quantity() {
        let store = MemoryStore::new(vec![MEMBER]);
        let reply = bot(&store)
            .handle(&request(MEMBER, "CODE1, січень-січень 2024"))
            .expect("reply");
        assert_eq!(reply.format, Format::Html);
        let a = reply.text.find("A-Supplier").expect("A listed");
        let b = reply.text.find("B-Supplier").expect("B listed");
        assert!(a < b);
        assert!(reply.text.contains("        10"));
        assert!(reply.text.contains("         5"));
    }

    #[test]
    fn no_sales_message_depends_on_period() {
        let store = MemoryStore::new(vec![MEMBER]);
        let mut bot = bot(&store);
        let reply = bot
            .handle(&request(MEMBER, "code1, лютий-березень 2024"))
            .expect("reply");
        assert_eq!(reply.text, "Продажів за вказаний період не знайдено.");
        let reply = bot.handle(&request(MEMBER, "nothing")).expect("reply");
        assert_eq!(reply.text, "Продажів не знайдено.");
    }

    #[test]
    fn unknown_month_is_reported() {
        let store = MemoryStore::new(vec![MEMBER]);
        let reply = bot(&store)
            .handle(&request(MEMBER, "code1, травня-червня 2024"))
            .expect("reply");
        assert_eq!(reply.text, "Не вдалося розпізнати місяці.");
    }

    #[test]
    fn admin_add_is_idempotent() {
        let store = MemoryStore::default();
        let mut bot = bot(&store);
        let reply = bot.handle(&request(ADMIN, "/admin add 555")).expect("reply");
        assert_eq!(reply.text, "✅ Користувача 555 додано.");
        let reply = bot.handle(&request(ADMIN, "/admin add 555")).expect("reply");
        assert_eq!(reply.text, "ℹ️ Користувач 555 вже є.");
        assert_eq!(store.snapshot(), vec![555]);
    }

    #[test]
    fn admin_command_validates_arguments() {
        let store = MemoryStore::default();
        let mut bot = bot(&store);
        for text in ["/admin", "/admin add", "/admin remove 5", "/admin add 5 6"] {
            let reply = bot.handle(&request(ADMIN, text)).expect("reply");
            assert_eq!(reply.text, ADMIN_USAGE, "command {text:?}");
        }
        let reply = bot.handle(&request(ADMIN, "/admin add abc")).expect("reply");
        assert_eq!(reply.text, "❗ ID має бути числом.");
        assert!(store.snapshot().is_empty());
    }

    #[test]
    fn admin_commands_reject_others() {
        let store = MemoryStore::new(vec![MEMBER]);
        let mut bot = bot(&store);
        for text in ["/admin add 9", "/users", "/reload"] {
            let reply = bot.handle(&request(MEMBER, text)).expect("reply");
            assert_eq!(reply.text, NO_RIGHTS, "command {text:?}");
        }
        assert_eq!(store.snapshot(), vec![MEMBER]);
    }

    #[test]
    fn users_lists_allow_list() {
        let store = MemoryStore::new(vec![10, 20]);
        let reply = bot(&store).handle(&request(ADMIN, "/users")).expect("reply");
        assert_eq!(reply.text, "👥 Список дозволених ID:\n10\n20");
    }

    #[test]
    fn callback_prompts_for_query_format() {
        let store = MemoryStore::default();
        let mut bot = bot(&store);
        let reply = bot
            .handle(&Request {
                user: STRANGER,
                first_name: String::new(),
                input: Incoming::Callback(MAKE_QUERY.into()),
            })
            .expect("reply");
        assert_eq!(reply.text, QUERY_HINT);
        assert!(
            bot.handle(&Request {
                user: STRANGER,
                first_name: String::new(),
                input: Incoming::Callback("other".into()),
            })
            .is_none()
        );
    }

    #[test]
    fn unknown_commands_are_ignored() {
        let store = MemoryStore::default();
        assert!(bot(&store).handle(&request(ADMIN, "/frobnicate")).is_none());
    }

    #[test]
    fn reload_swaps_the_snapshot() {
        let store = MemoryStore::default();
        let access = AccessControl::new(ADMIN, &store).expect("allow-list");
        let mut bot = Bot::new(access, StaticSource(dataset()), Dataset::default());
        assert!(bot.dataset().is_empty());
        let reply = bot.handle(&request(ADMIN, "/reload")).expect("reply");
        assert_eq!(reply.text, "🔄 Дані оновлено. Аркушів: 2.");
        assert_eq!(bot.dataset().len(), 2);
    }

    #[test]
    fn failed_reload_keeps_previous_snapshot() {
        let store = MemoryStore::default();
        let access = AccessControl::new(ADMIN, &store).expect("allow-list");
        let mut bot = Bot::new(access, BrokenSource, dataset());
        let reply = bot.handle(&request(ADMIN, "/reload")).expect("reply");
        assert!(reply.text.starts_with("❗ Не вдалося оновити дані"));
        assert_eq!(bot.dataset().len(), 2);
    }
}
