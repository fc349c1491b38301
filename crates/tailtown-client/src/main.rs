//! `tailtown` terminal front end.
//!
//! Reads one command per line from stdin.  Live chat updates arrive on a
//! channel and are printed between prompts.

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info};

use tailtown_client::commands::chat::{self as chat_cmd, ChatView, ConversationDto, MessageDto};
use tailtown_client::commands::listings::{self, CreateListingForm, ListingDto, PetDetailView};
use tailtown_client::commands::navigation::{self, dashboard_actions, Route, RouteDecision};
use tailtown_client::commands::{account, favorites};
use tailtown_client::config::ClientConfig;
use tailtown_client::events::ChatEvent;
use tailtown_client::state::ClientState;
use tailtown_client::ClientError;
use tailtown_shared::constants::APP_NAME;

const CREATE_USAGE: &str =
    "usage: create <type> | <name> | <breed> | <age> | <description> [| <image url>]";

const HELP: &str = "\
commands:
  signup <email> <password> <Buyer|Seller|Admin> <name...>
  login <email> <password>
  logout
  whoami
  dashboard
  pets [type] [breed]                 (use - to skip the type)
  pet <id>
  create <type> | <name> | <breed> | <age> | <description> [| <image url>]
  fav <id> | unfav <id> | favs
  contact <pet id>                    open a chat with the pet's seller
  chats
  open <chat id>
  say <text>
  close
  help
  quit";

struct Repl {
    state: ClientState,
    events: mpsc::UnboundedSender<ChatEvent>,
    view: Option<ChatView>,
}

enum Flow {
    Continue,
    Quit,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ClientConfig::from_env();
    tailtown_client::init_tracing(&config);

    info!("Starting {APP_NAME} client v{}", env!("CARGO_PKG_VERSION"));

    let state = ClientState::start(config).context("failed to open the TailTown store")?;
    state.session.resolved().await?;

    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    let mut repl = Repl {
        state,
        events: events_tx,
        view: None,
    };

    println!("{APP_NAME}. Type `help` for commands.");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("failed to read stdin")? else {
                    break;
                };
                match repl.handle(line.trim()).await {
                    Ok(Flow::Continue) => {}
                    Ok(Flow::Quit) => break,
                    Err(e) => println!("error: {e}"),
                }
            }
            Some(event) = events_rx.recv() => repl.render_event(event),
        }
    }

    if let Some(mut view) = repl.view.take() {
        view.close();
    }
    repl.state.shutdown();
    info!("Goodbye");
    Ok(())
}

impl Repl {
    async fn handle(&mut self, line: &str) -> Result<Flow, ClientError> {
        let (cmd, rest) = line.split_once(' ').unwrap_or((line, ""));
        let rest = rest.trim();
        debug!(cmd, "command");

        match cmd {
            "" => {}
            "help" => println!("{HELP}"),
            "quit" | "exit" => return Ok(Flow::Quit),

            "signup" => {
                let mut parts = rest.splitn(4, ' ');
                let (email, password, role, name) = (
                    parts.next().unwrap_or_default(),
                    parts.next().unwrap_or_default(),
                    parts.next().unwrap_or_default(),
                    parts.next().unwrap_or_default(),
                );
                let me = account::sign_up(&self.state, email, password, name, role).await?;
                self.drop_view();
                println!("welcome, {} ({})", me.display_name, me.role.unwrap_or_default());
            }
            "login" => {
                let (email, password) = rest.split_once(' ').unwrap_or((rest, ""));
                let me = account::sign_in(&self.state, email, password.trim()).await?;
                self.drop_view();
                println!("signed in as {}", me.display_name);
            }
            "logout" => {
                self.drop_view();
                account::sign_out(&self.state).await?;
                println!("signed out");
            }
            "whoami" => match account::who_am_i(&self.state) {
                Some(me) => println!(
                    "{} <{}> role={} uid={}",
                    me.display_name,
                    me.email,
                    me.role.as_deref().unwrap_or("?"),
                    me.uid
                ),
                None => println!("not signed in"),
            },
            "dashboard" => {
                if !self.allowed(Route::Dashboard) {
                    return Ok(Flow::Continue);
                }
                let role = self.state.session.current_user().and_then(|u| u.role());
                for action in dashboard_actions(role) {
                    println!("  {:<30} {}", action.label, action.route.path());
                }
            }

            "pets" => {
                let mut parts = rest.split_whitespace();
                let pet_type = parts.next().filter(|t| *t != "-");
                let breed = parts.next();
                let found = listings::search_listings(&self.state, pet_type, breed).await?;
                if found.is_empty() {
                    println!("no pets found");
                }
                for listing in &found {
                    print_listing(listing);
                }
            }
            "pet" => {
                let view = listings::listing_detail(&self.state, rest).await?;
                print_detail(&view);
            }
            "create" => {
                if !self.allowed(Route::CreateListing) {
                    return Ok(Flow::Continue);
                }
                let fields: Vec<&str> = rest.split('|').map(str::trim).collect();
                if fields.len() < 5 {
                    return Err(ClientError::InvalidArgument(CREATE_USAGE.to_string()));
                }
                let form = CreateListingForm {
                    pet_type: fields[0].to_string(),
                    name: fields[1].to_string(),
                    breed: fields[2].to_string(),
                    age: fields[3].to_string(),
                    description: fields[4].to_string(),
                    image_url: fields.get(5).copied().unwrap_or_default().to_string(),
                };
                let listing = listings::create_listing(&self.state, &form).await?;
                println!("listed {} ({})", listing.name, listing.id);
            }

            "fav" => {
                let ids = favorites::add_favorite(&self.state, rest).await?;
                println!("{} favorite(s)", ids.len());
            }
            "unfav" => {
                let ids = favorites::remove_favorite(&self.state, rest).await?;
                println!("{} favorite(s)", ids.len());
            }
            "favs" => {
                let found = favorites::favorite_listings(&self.state).await?;
                if found.is_empty() {
                    println!("You haven't favorited any pets yet!");
                }
                for listing in &found {
                    print_listing(listing);
                }
            }

            "contact" => {
                let detail = listings::listing_detail(&self.state, rest).await?;
                let session = listings::contact_seller(&self.state, &detail.seller).await?;
                self.open_chat(session)?;
            }
            "chats" => {
                if !self.allowed(Route::Chats) {
                    return Ok(Flow::Continue);
                }
                let rows = chat_cmd::list_conversations(&self.state).await?;
                if rows.is_empty() {
                    println!("You have no active conversations yet.");
                }
                for row in &rows {
                    print_conversation(row);
                }
            }
            "open" => {
                let session = chat_cmd::find_conversation(&self.state, rest).await?;
                self.open_chat(session)?;
            }
            "say" => {
                let view = self
                    .view
                    .as_ref()
                    .ok_or_else(|| ClientError::InvalidArgument("No chat is open".to_string()))?;
                view.send(rest).await?;
            }
            "close" => self.drop_view(),

            other => println!("unknown command `{other}`, try `help`"),
        }
        Ok(Flow::Continue)
    }

    fn allowed(&self, route: Route) -> bool {
        match navigation::guard(&self.state.session.state(), route) {
            RouteDecision::Allow => true,
            RouteDecision::Pending => {
                println!("still loading, try again");
                false
            }
            RouteDecision::RedirectToLogin => {
                println!("please log in first");
                false
            }
            RouteDecision::Unauthorized => {
                println!("your role cannot open {}; see `dashboard`", route.path());
                false
            }
        }
    }

    fn open_chat(&mut self, session: tailtown_store::ChatSession) -> Result<(), ClientError> {
        let user = self.state.session.require_user()?;
        if self.view.as_ref().is_some_and(|v| v.local_uid() != user.uid) {
            self.drop_view();
        }
        let (backend, events) = (self.state.backend.clone(), self.events.clone());
        let view = self
            .view
            .get_or_insert_with(|| ChatView::new(backend, user.uid, events));
        view.open(session)?;
        if let Some(title) = view.title() {
            println!("-- {title} --");
        }
        Ok(())
    }

    fn drop_view(&mut self) {
        if let Some(mut view) = self.view.take() {
            view.close();
        }
    }

    fn render_event(&self, event: ChatEvent) {
        let active = self.view.as_ref().and_then(|v| v.active_chat_id());
        if active != Some(event.chat_id()) {
            return;
        }
        match event {
            ChatEvent::ChatMessages(payload) => {
                if payload.messages.is_empty() {
                    println!("No messages yet. Start the conversation!");
                }
                // Snapshots are complete; show the last few lines.
                let skip = payload.messages.len().saturating_sub(10);
                for message in payload.messages.iter().skip(skip) {
                    print_message(message);
                }
            }
            ChatEvent::ChatError(payload) => println!("error: {}", payload.message),
        }
    }
}

fn print_listing(l: &ListingDto) {
    println!(
        "  {}  {} the {} {} ({} yr), {}",
        l.id, l.name, l.breed, l.pet_type, l.age, l.status
    );
}

fn print_detail(view: &PetDetailView) {
    let l = &view.listing;
    println!("{} ({} / {}), age {}", l.name, l.pet_type, l.breed, l.age);
    println!("  {}", l.description);
    if let Some(ref url) = l.image_url {
        println!("  image: {url}");
    }
    let s = &view.seller;
    println!("  seller: {} [{}]", s.name, s.role);
    if let Some(ref email) = s.email {
        println!("  contact: {email}");
    }
    if let Some(ref err) = s.error {
        println!("  note: {err}");
    }
}

fn print_conversation(row: &ConversationDto) {
    println!(
        "  {}  {:<20} {}  {}",
        row.chat_id,
        row.other_name,
        row.preview,
        row.last_message_at.as_deref().unwrap_or("")
    );
}

fn print_message(m: &MessageDto) {
    let who = if m.sent { "You" } else { "Them" };
    let time = m.timestamp.get(11..16).unwrap_or(&m.timestamp);
    println!("  [{time}] {who}: {}", m.text);
}
