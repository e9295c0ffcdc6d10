//! SmartShop terminal front-end
//!
//! Landing, auth, dashboard and list-detail screens driven by line commands.
//! Logs go to a daily rolling file so stdout stays with the screens.
//!
//! Usage:
//!   cargo run --bin load_data    # optional: seed the demo account
//!   cargo run --bin smartshop

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use smartshop::aggregation::{format_amount, format_date};
use smartshop::app::App;
use smartshop::config::{Config, Locale};
use smartshop::local::LocalBackend;
use smartshop::router::View;

#[derive(Parser, Debug)]
#[command(name = "smartshop")]
#[command(about = "Shopping lists with per-list spending totals", long_about = None)]
struct Args {
    /// Database directory (overrides SMARTSHOP_DATA_DIR)
    #[arg(long)]
    data_dir: Option<PathBuf>,
    /// Message language, `es` or `en` (overrides SMARTSHOP_LOCALE)
    #[arg(long)]
    locale: Option<Locale>,
    /// Log directory (overrides SMARTSHOP_LOG_DIR, defaults to <data-dir>/logs)
    #[arg(long)]
    log_dir: Option<PathBuf>,
}

/// Screen copy in one language.
struct Strings {
    tagline: &'static str,
    landing_help: &'static str,
    sign_in_title: &'static str,
    sign_up_title: &'static str,
    to_sign_up: &'static str,
    to_sign_in: &'static str,
    auth_help: &'static str,
    email: &'static str,
    password: &'static str,
    processing: &'static str,
    signed_in_as: &'static str,
    my_lists: &'static str,
    no_lists: &'static str,
    first_list: &'static str,
    dashboard_help: &'static str,
    list_name: &'static str,
    total_spent: &'static str,
    products_registered: &'static str,
    loading: &'static str,
    no_products: &'static str,
    detail_help: &'static str,
    add_product: &'static str,
    product_name: &'static str,
    price: &'static str,
    store: &'static str,
    link: &'static str,
    unknown_command: &'static str,
    not_created: &'static str,
}

const ES: Strings = Strings {
    tagline: "Tu lista de compras inteligente",
    landing_help: "[e] Empezar   [q] Salir",
    sign_in_title: "Bienvenido de nuevo",
    sign_up_title: "Crea tu cuenta",
    to_sign_up: "[t] ¿No tienes cuenta? Regístrate",
    to_sign_in: "[t] ¿Ya tienes cuenta? Inicia sesión",
    auth_help: "[Enter] Continuar   [c] Volver   [q] Salir",
    email: "Correo Electrónico",
    password: "Contraseña",
    processing: "Procesando...",
    signed_in_as: "Sesión iniciada como: ",
    my_lists: "Mis Listas",
    no_lists: "No tienes listas aún",
    first_list: "Crea tu primera lista para empezar a organizar tus compras.",
    dashboard_help: "[n <nombre>] Nueva lista   [<número>] Abrir   [s] Cerrar sesión   [q] Salir",
    list_name: "Nombre de la lista (ej: Compras Semanales)",
    total_spent: "Gasto Total",
    products_registered: "productos registrados",
    loading: "Cargando...",
    no_products: "No hay productos en esta lista todavía.",
    detail_help: "[a] Añadir producto   [b] Volver   [s] Cerrar sesión   [q] Salir",
    add_product: "Añadir nuevo producto",
    product_name: "Nombre del producto",
    price: "Precio ($)",
    store: "Tienda",
    link: "Link del producto (opcional)",
    unknown_command: "Comando no reconocido.",
    not_created: "No se guardó nada: revisa el nombre y el precio.",
};

const EN: Strings = Strings {
    tagline: "Your smart shopping list",
    landing_help: "[e] Get started   [q] Quit",
    sign_in_title: "Welcome back",
    sign_up_title: "Create your account",
    to_sign_up: "[t] No account yet? Sign up",
    to_sign_in: "[t] Already have an account? Sign in",
    auth_help: "[Enter] Continue   [c] Back   [q] Quit",
    email: "Email",
    password: "Password",
    processing: "Working...",
    signed_in_as: "Signed in as: ",
    my_lists: "My Lists",
    no_lists: "You have no lists yet",
    first_list: "Create your first list to start organizing your shopping.",
    dashboard_help: "[n <name>] New list   [<number>] Open   [s] Sign out   [q] Quit",
    list_name: "List name (e.g. Weekly groceries)",
    total_spent: "Total spent",
    products_registered: "products",
    loading: "Loading...",
    no_products: "No products in this list yet.",
    detail_help: "[a] Add product   [b] Back   [s] Sign out   [q] Quit",
    add_product: "Add a new product",
    product_name: "Product name",
    price: "Price ($)",
    store: "Store",
    link: "Product link (optional)",
    unknown_command: "Unknown command.",
    not_created: "Nothing saved: check the name and the price.",
};

fn strings(locale: Locale) -> &'static Strings {
    match locale {
        Locale::Es => &ES,
        Locale::En => &EN,
    }
}

/// Install the global subscriber writing to `<dir>/smartshop.log.<date>`.
fn init_tracing(dir: &Path, json: bool) -> std::io::Result<WorkerGuard> {
    std::fs::create_dir_all(dir)?;
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "smartshop=info".into());

    let (writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::daily(dir, "smartshop.log"));
    let json_layer = json.then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(writer.clone())
    });
    let text_layer = (!json).then(|| {
        tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(writer)
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(text_layer)
        .init();
    Ok(guard)
}

struct Terminal {
    app: Arc<App>,
    locale: Locale,
    text: &'static Strings,
    lines: Lines<BufReader<Stdin>>,
    /// Auth screen mode: sign up instead of sign in.
    registering: bool,
    notice: Option<String>,
}

impl Terminal {
    async fn prompt(&mut self, label: &str) -> std::io::Result<Option<String>> {
        print!("{label}: ");
        std::io::stdout().flush()?;
        self.lines.next_line().await
    }

    fn render(&mut self) {
        println!();
        if let Some(notice) = self.notice.take() {
            println!("! {notice}");
        }
        if self.app.is_loading() {
            println!("{}", self.text.loading);
            return;
        }

        match self.app.view() {
            View::Landing => {
                println!("SmartShop · {}", self.text.tagline);
                println!("{}", self.text.landing_help);
            }
            View::Auth => {
                let (title, toggle) = if self.registering {
                    (self.text.sign_up_title, self.text.to_sign_in)
                } else {
                    (self.text.sign_in_title, self.text.to_sign_up)
                };
                println!("{title}");
                println!("{toggle}");
                println!("{}", self.text.auth_help);
            }
            View::Dashboard => self.render_dashboard(),
            View::ListDetail { .. } => self.render_detail(),
        }
    }

    fn render_dashboard(&self) {
        let Some(dashboard) = self.app.dashboard() else {
            return;
        };
        println!("{}{}", self.text.signed_in_as, dashboard.identity.email);
        println!("== {} ==", self.text.my_lists);
        if dashboard.lists.is_empty() {
            println!("{}", self.text.no_lists);
            println!("{}", self.text.first_list);
        }
        for (n, summary) in dashboard.lists.iter().enumerate() {
            println!(
                "  [{}] {}  ({})  {}: {}",
                n + 1,
                summary.list.name,
                format_date(summary.list.created_at, self.locale, &chrono::Local),
                self.text.total_spent,
                format_amount(summary.total)
            );
        }
        println!("{}", self.text.dashboard_help);
    }

    fn render_detail(&self) {
        let Some(detail) = self.app.list_detail() else {
            return;
        };
        println!("== {} ==", detail.title.as_deref().unwrap_or(&detail.list_id));
        if !detail.loading {
            println!("{} {}", detail.products.len(), self.text.products_registered);
        }
        println!("{}: {}", self.text.total_spent, format_amount(detail.total));
        if detail.loading {
            println!("{}", self.text.loading);
        } else if detail.products.is_empty() {
            println!("{}", self.text.no_products);
        }
        for product in &detail.products {
            let mut line = format!("  - {}  {}", product.name, format_amount(product.price));
            if !product.store.is_empty() {
                line.push_str(&format!("  {}: {}", self.text.store, product.store));
            }
            if !product.link.is_empty() {
                line.push_str(&format!("  {}", product.link));
            }
            println!("{line}");
        }
        println!("{}", self.text.detail_help);
    }

    /// Handle one command. Returns `false` when the user quits or stdin ends.
    async fn step(&mut self) -> std::io::Result<bool> {
        let Some(line) = self.prompt(">").await? else {
            return Ok(false);
        };
        let line = line.trim();
        if line == "q" {
            return Ok(false);
        }

        match self.app.view() {
            View::Landing => match line {
                "e" => {
                    self.app.start_auth();
                }
                _ => self.unknown(),
            },
            View::Auth => match line {
                "" => return self.submit_credentials().await,
                "t" => self.registering = !self.registering,
                "c" => {
                    self.app.cancel_auth();
                }
                _ => self.unknown(),
            },
            View::Dashboard => self.dashboard_command(line).await?,
            View::ListDetail { list_id } => match line {
                "a" => return self.add_product(&list_id).await,
                "b" => {
                    self.app.back();
                }
                "s" => self.app.sign_out().await,
                _ => self.unknown(),
            },
        }
        Ok(true)
    }

    async fn submit_credentials(&mut self) -> std::io::Result<bool> {
        let Some(email) = self.prompt(self.text.email).await? else {
            return Ok(false);
        };
        let Some(password) = self.prompt(self.text.password).await? else {
            return Ok(false);
        };
        println!("{}", self.text.processing);

        let result = if self.registering {
            self.app.sign_up(&email, &password).await
        } else {
            self.app.sign_in(&email, &password).await
        };
        if let Err(err) = result {
            self.notice = Some(self.app.auth_message(&err).to_string());
        }
        Ok(true)
    }

    async fn dashboard_command(&mut self, line: &str) -> std::io::Result<()> {
        if line == "s" {
            self.app.sign_out().await;
        } else if line == "n" {
            if let Some(name) = self.prompt(self.text.list_name).await? {
                self.create_list(&name).await;
            }
        } else if let Some(name) = line.strip_prefix("n ") {
            self.create_list(name).await;
        } else if let Ok(n) = line.parse::<usize>() {
            let lists = self.app.dashboard().map(|d| d.lists).unwrap_or_default();
            match n.checked_sub(1).and_then(|i| lists.get(i)) {
                Some(summary) => {
                    self.app.select_list(&summary.list.id).await;
                }
                None => self.unknown(),
            }
        } else {
            self.unknown();
        }
        Ok(())
    }

    async fn create_list(&mut self, name: &str) {
        if self.app.create_list(name).await.is_none() {
            self.notice = Some(self.text.not_created.to_string());
        }
    }

    async fn add_product(&mut self, list_id: &str) -> std::io::Result<bool> {
        println!("{}", self.text.add_product);
        let mut fields = Vec::with_capacity(4);
        for label in [
            self.text.product_name,
            self.text.price,
            self.text.store,
            self.text.link,
        ] {
            let Some(value) = self.prompt(label).await? else {
                return Ok(false);
            };
            fields.push(value);
        }

        let [name, price, store, link] = &fields[..] else {
            return Ok(true);
        };
        if self
            .app
            .add_product(list_id, name, price, store, link)
            .await
            .is_none()
        {
            self.notice = Some(self.text.not_created.to_string());
        }
        Ok(true)
    }

    fn unknown(&mut self) {
        self.notice = Some(self.text.unknown_command.to_string());
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let mut config = Config::from_env()?;
    if let Some(data_dir) = args.data_dir {
        config.data_dir = data_dir;
    }
    if let Some(locale) = args.locale {
        config.locale = locale;
    }
    if let Some(log_dir) = args.log_dir {
        config.log_dir = Some(log_dir);
    }

    let log_dir = config
        .log_dir
        .clone()
        .unwrap_or_else(|| config.data_dir.join("logs"));
    let _log_guard = init_tracing(&log_dir, config.log_json)?;
    tracing::info!(data_dir = %config.data_dir.display(), locale = ?config.locale, "starting smartshop");

    let backend = Arc::new(LocalBackend::open(&config)?);
    let app = App::new(backend, config.locale);
    app.start();

    let mut terminal = Terminal {
        app: Arc::clone(&app),
        locale: config.locale,
        text: strings(config.locale),
        lines: BufReader::new(tokio::io::stdin()).lines(),
        registering: false,
        notice: None,
    };
    loop {
        terminal.render();
        if !terminal.step().await? {
            break;
        }
    }

    app.shutdown();
    tracing::info!("smartshop stopped");
    Ok(())
}
