use std::cell::RefCell;
use std::rc::Rc;

use anyhow::{bail, Result};
use gatehouse_model::PlayerId;
use gatestore::DocumentStore;
use tempdir::TempDir;

use super::core_commands::{register_core_commands, CORE_OWNER};
use super::*;
use crate::backend::{Caller, PlayerActions, PlayerHandle, ServerActions};
use crate::config::Messages;
use crate::registry::PlayerRegistry;
use crate::services::Services;

type Log = Rc<RefCell<Vec<String>>>;

struct TestCaller {
    console: bool,
    replies: RefCell<Vec<String>>,
}

impl TestCaller {
    fn player() -> Self {
        Self {
            console: false,
            replies: Default::default(),
        }
    }

    fn console() -> Self {
        Self {
            console: true,
            replies: Default::default(),
        }
    }

    fn replies(&self) -> Vec<String> {
        self.replies.borrow().clone()
    }
}

impl Caller for TestCaller {
    fn id(&self) -> PlayerId {
        if self.console {
            PlayerId::from("console")
        } else {
            PlayerId::from("76561198000000009")
        }
    }

    fn name(&self) -> String {
        let name = if self.console { "Server" } else { "Mallory" };
        name.to_owned()
    }

    fn is_console(&self) -> bool {
        self.console
    }

    fn reply(&self, text: &str) {
        self.replies.borrow_mut().push(text.to_owned());
    }
}

struct TestPlayer {
    id: &'static str,
    name: &'static str,
    log: Log,
}

impl PlayerHandle for TestPlayer {
    fn id(&self) -> PlayerId {
        PlayerId::from(self.id)
    }

    fn display_name(&self) -> String {
        self.name.to_owned()
    }
}

impl PlayerActions for TestPlayer {
    fn message(&self, text: &str) {
        self.log.borrow_mut().push(format!("message {} {text}", self.id));
    }

    fn kick(&self, reason: &str) -> Result<()> {
        self.log.borrow_mut().push(format!("kick {} {reason}", self.id));
        Ok(())
    }

    fn ban(&self, reason: &str) -> Result<()> {
        self.log.borrow_mut().push(format!("ban {} {reason}", self.id));
        Ok(())
    }

    fn teleport(&self, x: f32, y: f32, z: f32) -> Result<()> {
        self.log
            .borrow_mut()
            .push(format!("teleport {} {x} {y} {z}", self.id));
        Ok(())
    }
}

struct TestServer {
    log: Log,
}

impl ServerActions for TestServer {
    fn broadcast(&self, text: &str) {
        self.log.borrow_mut().push(format!("broadcast {text}"));
    }

    fn run_command(&self, command: &str, args: &[String]) -> Result<()> {
        self.log
            .borrow_mut()
            .push(format!("run {command} {}", args.join(" ")));
        Ok(())
    }
}

/// Table whose callbacks append to a plain list of strings.
fn recording_table() -> CommandTable<Vec<String>> {
    CommandTable::new().with_protected_owners([CORE_OWNER])
}

fn record(tag: &'static str) -> impl FnMut(&mut Vec<String>, &dyn Caller, &str, &[String]) -> Result<bool> {
    move |log: &mut Vec<String>, _: &dyn Caller, command: &str, args: &[String]| {
        log.push(format!("{tag}:{command}:{}", args.join("|")));
        Ok(true)
    }
}

#[test]
fn second_registration_conflicts_and_first_stays_active() -> Result<()> {
    let mut dispatcher = CommandDispatcher::new(recording_table());
    dispatcher.register_command("oxide.load", "ext.a", record("a"))?;

    let err = dispatcher
        .register_command("oxide.load", "ext.b", record("b"))
        .unwrap_err();
    assert_eq!(
        err,
        CommandError::AlreadyExists {
            name: "oxide.load".into(),
            owner: "ext.a".into()
        }
    );

    let mut log = vec![];
    let handled = dispatcher.handle_console_message(&mut log, &TestCaller::console(), "oxide.load kits")?;
    assert!(handled);
    assert_eq!(log, vec!["a:oxide.load:kits"]);
    Ok(())
}

#[test]
fn names_are_trimmed_and_lower_cased() -> Result<()> {
    let mut table = recording_table();
    table.register("  Hello ", "ext", record("x"))?;
    assert!(table.contains("HELLO"));
    assert_eq!(table.names(), vec!["hello"]);
    assert_eq!(table.owner_of("hello"), Some("ext"));

    let mut dispatcher = CommandDispatcher::new(table);
    let mut log = vec![];
    assert!(dispatcher.handle_chat_message(&mut log, &TestCaller::player(), "/HeLLo World")?);
    assert_eq!(log, vec!["x:hello:World"]);
    Ok(())
}

#[test]
fn invalid_names_are_rejected() {
    let mut table = recording_table();
    for name in ["", "   ", "two words", "quo\"te"] {
        assert!(matches!(
            table.register(name, "ext", record("x")),
            Err(CommandError::InvalidName(_))
        ));
    }
    assert!(table.is_empty());
}

#[test]
fn only_the_owner_unregisters() -> Result<()> {
    let mut table = recording_table();
    table.register("heal", "ext.medic", record("x"))?;

    assert!(matches!(
        table.unregister("heal", "ext.other"),
        Err(CommandError::NotOwner { .. })
    ));
    assert!(table.contains("heal"));
    assert!(table.unregister("HEAL", "ext.medic")?);
    assert!(!table.unregister("heal", "ext.medic")?);
    assert!(table.is_empty());
    Ok(())
}

#[test]
fn unloading_an_owner_drops_its_commands() -> Result<()> {
    let mut table = recording_table();
    table.register("heal", "ext.medic", record("x"))?;
    table.register("revive", "ext.medic", record("x"))?;
    table.register("kits", "ext.kits", record("x"))?;

    assert_eq!(table.unregister_owner("ext.medic"), 2);
    assert_eq!(table.names(), vec!["kits"]);
    assert_eq!(table.unregister_owner("ext.medic"), 0);
    Ok(())
}

#[test]
fn replace_policy_spares_protected_owners() -> Result<()> {
    let mut table = recording_table().with_policy(OverridePolicy::ReplaceUnprotected);
    table.register("tp", "ext.a", record("a"))?;
    table.register("players", CORE_OWNER, record("core"))?;

    table.register("tp", "ext.b", record("b"))?;
    assert_eq!(table.owner_of("tp"), Some("ext.b"));

    assert!(table.is_protected("players"));
    assert!(matches!(
        table.register("players", "ext.b", record("b")),
        Err(CommandError::Protected { .. })
    ));

    let mut dispatcher = CommandDispatcher::new(table);
    let mut log = vec![];
    let caller = TestCaller::console();
    dispatcher.handle_console_message(&mut log, &caller, "tp")?;
    dispatcher.handle_console_message(&mut log, &caller, "players")?;
    assert_eq!(log, vec!["b:tp:", "core:players:"]);
    Ok(())
}

#[test]
fn chat_needs_a_prefix() -> Result<()> {
    let mut dispatcher = CommandDispatcher::new(recording_table()).with_chat_prefixes(['!']);
    dispatcher.register_command("echo", "ext", record("x"))?;
    let caller = TestCaller::player();
    let mut log = vec![];

    assert!(!dispatcher.handle_chat_message(&mut log, &caller, "echo plain chat")?);
    assert!(!dispatcher.handle_chat_message(&mut log, &caller, "/echo wrong prefix")?);
    assert!(!dispatcher.handle_chat_message(&mut log, &caller, "!")?);
    assert!(dispatcher.handle_chat_message(&mut log, &caller, r#"!echo "hello world" x"#)?);
    assert_eq!(log, vec!["x:echo:hello world|x"]);
    Ok(())
}

#[test]
fn unknown_and_empty_input_are_not_handled() -> Result<()> {
    let mut dispatcher = CommandDispatcher::new(recording_table());
    let caller = TestCaller::console();
    let mut log = vec![];

    assert!(!dispatcher.handle_console_message(&mut log, &caller, "nosuch thing")?);
    assert!(!dispatcher.handle_console_message(&mut log, &caller, "   ")?);
    assert!(log.is_empty());
    assert!(caller.replies().is_empty());
    Ok(())
}

#[test]
fn callback_may_decline() -> Result<()> {
    let mut dispatcher = CommandDispatcher::new(recording_table());
    dispatcher.register_command("maybe", "ext", |_: &mut Vec<String>, _: &dyn Caller, _: &str, args: &[String]| {
        Ok(!args.is_empty())
    })?;
    let caller = TestCaller::console();
    let mut log = vec![];

    assert!(!dispatcher.handle_console_message(&mut log, &caller, "maybe")?);
    assert!(dispatcher.handle_console_message(&mut log, &caller, "maybe yes")?);
    Ok(())
}

#[test]
fn failing_callback_leaves_table_usable() -> Result<()> {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut dispatcher = CommandDispatcher::new(recording_table());
    dispatcher.register_command("boom", "ext", |_: &mut Vec<String>, _: &dyn Caller, _: &str, args: &[String]| {
        if args.is_empty() {
            bail!("nothing to blow up");
        }
        Ok(true)
    })?;
    let caller = TestCaller::console();
    let mut log = vec![];

    let err = dispatcher
        .handle_console_message(&mut log, &caller, "boom")
        .unwrap_err();
    assert_eq!(err.to_string(), "Command 'boom' failed");
    assert_eq!(err.root_cause().to_string(), "nothing to blow up");

    assert!(dispatcher.table().contains("boom"));
    assert!(dispatcher.handle_console_message(&mut log, &caller, "boom now")?);
    Ok(())
}

struct CoreFixture {
    _dir: TempDir,
    services: Services<TestPlayer>,
    dispatcher: CommandDispatcher<Services<TestPlayer>>,
    log: Log,
}

impl CoreFixture {
    fn new() -> Result<Self> {
        Self::with_messages(Messages::default())
    }

    fn with_messages(messages: Messages) -> Result<Self> {
        let dir = TempDir::new("core_commands")?;
        let log = Log::default();
        let registry = PlayerRegistry::load(DocumentStore::open(dir.path().join("players"))?)?;
        let data = DocumentStore::open(dir.path().join("data"))?;
        let services = Services::new(
            registry,
            data,
            messages,
            Box::new(TestServer { log: log.clone() }),
        );
        let mut table = CommandTable::new().with_protected_owners([CORE_OWNER]);
        register_core_commands(&mut table)?;
        Ok(Self {
            _dir: dir,
            services,
            dispatcher: CommandDispatcher::new(table),
            log,
        })
    }

    fn connect(&mut self, id: &'static str, name: &'static str) -> Result<()> {
        let player = TestPlayer {
            id,
            name,
            log: self.log.clone(),
        };
        self.services.registry.notify_connect(player)?;
        Ok(())
    }

    fn console(&mut self, line: &str) -> Result<Vec<String>> {
        let caller = TestCaller::console();
        assert!(self
            .dispatcher
            .handle_console_message(&mut self.services, &caller, line)?);
        Ok(caller.replies())
    }

    fn log(&self) -> Vec<String> {
        self.log.borrow().clone()
    }
}

#[test]
fn core_commands_are_protected() -> Result<()> {
    let mut fixture = CoreFixture::new()?;
    let table = fixture.dispatcher.table_mut();
    for name in ["players", "find", "whois", "kick", "ban", "unban"] {
        assert_eq!(table.owner_of(name), Some(CORE_OWNER));
        assert!(table.is_protected(name));
    }
    assert!(table
        .register("kick", "ext", |_: &mut Services<TestPlayer>, _: &dyn Caller, _: &str, _: &[String]| Ok(true))
        .is_err());
    Ok(())
}

#[test]
fn players_lists_connected() -> Result<()> {
    let mut fixture = CoreFixture::new()?;
    assert_eq!(fixture.console("players")?, vec!["Nobody is online"]);

    fixture.connect("2", "Bob")?;
    fixture.connect("1", "Alice")?;
    assert_eq!(
        fixture.console("players")?,
        vec!["Players online (2): Alice (1), Bob (2)"]
    );
    Ok(())
}

#[test]
fn find_reports_ambiguity() -> Result<()> {
    let mut fixture = CoreFixture::new()?;
    fixture.connect("1", "Bob")?;
    fixture.connect("2", "Bobby")?;

    assert_eq!(
        fixture.console("find bo")?,
        vec!["Several players match 'bo': Bob (1), Bobby (2)"]
    );
    assert_eq!(fixture.console("find zed")?, vec!["No player matches 'zed'"]);

    let replies = fixture.console("find bobby")?;
    assert_eq!(replies.len(), 1);
    assert!(replies[0].starts_with("Bobby (2), first seen "));
    assert!(replies[0].ends_with(", online"));

    // an exact id wins over the name search
    let replies = fixture.console("find 1")?;
    assert!(replies[0].starts_with("Bob (1)"));
    Ok(())
}

#[test]
fn whois_needs_exact_id() -> Result<()> {
    let mut fixture = CoreFixture::new()?;
    fixture.connect("1", "Bob")?;
    fixture.services.registry.disconnect_id(&PlayerId::from("1"));

    assert!(fixture.console("whois 1")?[0].ends_with(", offline"));
    assert_eq!(fixture.console("whois bob")?, vec!["No player matches 'bob'"]);
    assert_eq!(fixture.console("whois")?, vec!["Usage: whois <id>"]);
    Ok(())
}

#[test]
fn players_cannot_kick() -> Result<()> {
    let mut fixture = CoreFixture::new()?;
    fixture.connect("1", "Bob")?;
    let caller = TestCaller::player();

    assert!(fixture
        .dispatcher
        .handle_chat_message(&mut fixture.services, &caller, "/kick bob")?);
    assert_eq!(caller.replies(), vec!["You are not allowed to use kick"]);
    assert!(fixture.services.registry.is_connected(&PlayerId::from("1")));
    assert!(fixture.log().is_empty());
    Ok(())
}

#[test]
fn console_kicks_connected_player() -> Result<()> {
    let mut fixture = CoreFixture::new()?;
    fixture.connect("1", "Bob")?;

    assert!(fixture.console("kick bob spamming chat")?.is_empty());
    assert_eq!(
        fixture.log(),
        vec!["kick 1 spamming chat", "broadcast Bob was kicked: spamming chat"]
    );
    let id = PlayerId::from("1");
    assert!(!fixture.services.registry.is_connected(&id));
    assert!(fixture.services.registry.find_by_id(&id).is_some());
    Ok(())
}

#[test]
fn ban_is_persisted_until_unban() -> Result<()> {
    let mut fixture = CoreFixture::new()?;
    fixture.connect("1", "Bob")?;
    let id = PlayerId::from("1");

    fixture.console("ban Bob")?;
    assert_eq!(fixture.log(), vec!["ban 1 Banned", "broadcast Bob was banned: Banned"]);
    assert!(fixture.services.is_banned(&id)?);
    assert_eq!(fixture.services.ban_reason(&id)?.as_deref(), Some("Banned"));
    assert!(!fixture.services.registry.is_connected(&id));

    let on_disk = std::fs::read_to_string(
        fixture.services.data.path_of(crate::services::BANS_DOCUMENT)?,
    )?;
    assert!(on_disk.contains("by: Server"));

    assert_eq!(fixture.console("unban 1")?, vec!["Bob is no longer banned"]);
    assert!(!fixture.services.is_banned(&id)?);
    assert_eq!(fixture.console("unban bob")?, vec!["Bob is not banned"]);
    Ok(())
}

#[test]
fn core_texts_come_from_messages() -> Result<()> {
    let mut fixture = CoreFixture::with_messages(Messages {
        default_kick_reason: "Bye".into(),
        status_online: "here".into(),
        usage_kick: "kick who?".into(),
        ..Default::default()
    })?;
    fixture.connect("1", "Bob")?;

    assert!(fixture.console("whois 1")?[0].ends_with(", here"));
    assert_eq!(fixture.console("kick")?, vec!["kick who?"]);
    fixture.console("kick bob")?;
    assert_eq!(fixture.log(), vec!["kick 1 Bye", "broadcast Bob was kicked: Bye"]);
    Ok(())
}
