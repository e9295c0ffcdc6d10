//! Seed script for SmartShop
//!
//! Creates (or signs into) a demo account and fills it with a few lists and
//! products, going through the same stores the terminal app uses.
//! Run: cargo run --bin load_data
//! Then sign in with demo@smartshop.local / demo1234.

use std::sync::Arc;

use smartshop::aggregation::format_amount;
use smartshop::backend::Backend;
use smartshop::config::Config;
use smartshop::error::AuthError;
use smartshop::lists::ListStore;
use smartshop::local::LocalBackend;
use smartshop::products::ProductStore;

const DEMO_EMAIL: &str = "demo@smartshop.local";
const DEMO_PASSWORD: &str = "demo1234";

/// (list, [(name, price, store, link)])
const SAMPLE: &[(&str, &[(&str, &str, &str, &str)])] = &[
    (
        "Compras Semanales",
        &[
            ("Leche entera", "1.15", "Mercadona", ""),
            ("Pan de molde", "1.89", "Mercadona", ""),
            ("Huevos (12)", "2.60", "Lidl", ""),
            ("Café molido", "4.35", "", ""),
        ],
    ),
    (
        "Oficina en casa",
        &[
            ("Monitor 4K LG", "329.99", "Amazon", "https://www.amazon.es"),
            ("Soporte para portátil", "24.90", "", ""),
        ],
    ),
    ("Regalos de Navidad", &[]),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "smartshop=info".into()),
        )
        .init();

    let config = Config::from_env()?;
    let backend: Arc<dyn Backend> = Arc::new(LocalBackend::open(&config)?);

    let identity = match backend.sign_up(DEMO_EMAIL, DEMO_PASSWORD).await {
        Ok(identity) => identity,
        Err(AuthError::EmailInUse) => backend.sign_in(DEMO_EMAIL, DEMO_PASSWORD).await?,
        Err(err) => return Err(err.into()),
    };

    let lists = ListStore::new(Arc::clone(&backend));
    let products = ProductStore::new(Arc::clone(&backend));
    lists.bind(&identity)?;
    products.bind(&identity)?;

    for (list_name, items) in SAMPLE {
        let Some(list_id) = lists.create_list(list_name).await? else {
            continue;
        };
        for (name, price, store, link) in *items {
            products.add_product(&list_id, name, price, store, link).await?;
        }
    }

    println!("✅ Seeded {} in {}", DEMO_EMAIL, config.data_dir.display());
    for list in lists.lists() {
        println!("   {}  {}", list.name, format_amount(products.total_for(&list.id)));
    }

    // Leave the app on the landing screen next time.
    backend.sign_out().await?;
    Ok(())
}
