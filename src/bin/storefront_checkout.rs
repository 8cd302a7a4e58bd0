use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use serde::Serialize;
use serde_json::json;
use storefront_checkout::{
    config::{self, CheckoutConfig},
    models::Order,
    CheckoutContext, InMemoryCartStore, LoggingNavigator, PollerState, ReconcileOutcome, Route,
};
use url::Url;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let context = initialize()?;

    match cli.command {
        Commands::Order(args) => handle_order(&context, args, cli.json).await?,
        Commands::Confirmation(args) => handle_confirmation(&context, args, cli.json).await?,
        Commands::Reconcile(args) => handle_reconcile(&context, args, cli.json).await?,
        Commands::PaymeWatch(args) => handle_payme_watch(&context, args, cli.json).await?,
    }

    Ok(())
}

#[derive(Parser)]
#[command(
    name = "storefront-checkout",
    about = "Inspect and finish storefront checkouts from the command line",
    version = concat!(
        env!("CARGO_PKG_VERSION"),
        " (",
        env!("CHECKOUT_GIT_HASH"),
        ", built ",
        env!("CHECKOUT_BUILD_DATE"),
        ")"
    )
)]
struct Cli {
    #[arg(
        long,
        global = true,
        action = ArgAction::SetTrue,
        help = "Render command output as pretty JSON"
    )]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Look up an order by number and customer email
    Order(OrderArgs),
    /// Look up the order behind an order-confirmation link
    Confirmation(ConfirmationArgs),
    /// Finish a checkout from the URL the processor redirected back to
    Reconcile(ReconcileArgs),
    /// Poll a PayMe order until the transfer is confirmed
    PaymeWatch(PaymeWatchArgs),
}

#[derive(Args)]
struct OrderArgs {
    #[arg(help = "Order number, e.g. FL-1042")]
    order_number: String,
    #[arg(long, help = "Email address the order was placed with")]
    email: String,
}

#[derive(Args)]
struct ConfirmationArgs {
    #[arg(value_parser = parse_url, help = "Full order-confirmation URL")]
    url: Url,
}

#[derive(Args)]
struct ReconcileArgs {
    #[arg(
        value_parser = parse_url,
        help = "Return URL carrying payment_intent_client_secret"
    )]
    return_url: Url,
}

#[derive(Args)]
struct PaymeWatchArgs {
    #[arg(help = "PayMe order number")]
    order_number: String,
    #[arg(long, help = "Email address the order was placed with")]
    email: String,
    #[arg(long, help = "Override the poll interval in seconds")]
    interval_secs: Option<u64>,
}

fn initialize() -> Result<CheckoutContext> {
    let mut config: CheckoutConfig =
        config::load_config().context("failed to load checkout config")?;
    config::init_tracing(&config.log_level, config.log_json);

    // A terminal has nothing to show during presentational delays.
    config.success_redirect_delay_ms = 0;
    config.retry_redirect_delay_ms = 0;
    config.payme_success_delay_ms = 0;

    CheckoutContext::from_config(
        config,
        Arc::new(InMemoryCartStore::new()),
        Arc::new(LoggingNavigator),
    )
    .context("failed to initialize checkout context")
}

async fn handle_order(context: &CheckoutContext, args: OrderArgs, json: bool) -> Result<()> {
    let order = context
        .order_lookup()
        .get_order(&args.order_number, &args.email)
        .await
        .with_context(|| format!("failed to load order {}", args.order_number))?;

    if json {
        print_json(&order)?;
    } else {
        render_order(&order);
    }
    Ok(())
}

async fn handle_confirmation(
    context: &CheckoutContext,
    args: ConfirmationArgs,
    json: bool,
) -> Result<()> {
    let order = context
        .order_lookup()
        .from_confirmation_url(&args.url)
        .await
        .context("failed to resolve confirmation link")?;

    if json {
        print_json(&order)?;
    } else {
        render_order(&order);
    }
    Ok(())
}

async fn handle_reconcile(context: &CheckoutContext, args: ReconcileArgs, json: bool) -> Result<()> {
    let outcome = context.flow.reconciler().reconcile(&args.return_url).await;

    let outcome = match outcome {
        Ok(outcome) => outcome,
        Err(err) => {
            if let Some(reference) = err.payment_reference() {
                eprintln!(
                    "Payment {} was taken but the order could not be completed. Quote this reference to support.",
                    reference
                );
            }
            return Err(anyhow::Error::new(err).context("failed to reconcile payment return"));
        }
    };

    match outcome {
        ReconcileOutcome::Completed(order) => {
            let confirmation = confirmation_url(context, &order)?;
            if json {
                print_json(&json!({
                    "status": "completed",
                    "order": order,
                    "confirmationUrl": confirmation.map(|u| u.to_string()),
                }))?;
            } else {
                println!("Order {} created.", order.order_number);
                if let Some(url) = confirmation {
                    println!("Confirmation: {}", url);
                }
            }
        }
        ReconcileOutcome::StillProcessing { payment_reference } => {
            if json {
                print_json(&json!({
                    "status": "processing",
                    "paymentReference": payment_reference,
                }))?;
            } else {
                println!(
                    "Payment {} is still processing. Run this command again shortly.",
                    payment_reference
                );
            }
        }
    }
    Ok(())
}

async fn handle_payme_watch(
    context: &CheckoutContext,
    args: PaymeWatchArgs,
    json: bool,
) -> Result<()> {
    let mut poller = context.flow.payme_poller().clone();
    if let Some(secs) = args.interval_secs {
        poller = poller.with_interval(std::time::Duration::from_secs(secs.max(1)));
    }

    let handle = poller.spawn(args.order_number.clone(), args.email.clone());
    let mut updates = handle.subscribe();

    let final_state = loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break handle.wait().await;
                }
                let state = *updates.borrow_and_update();
                match state {
                    PollerState::Polling { checks } => {
                        if !json {
                            println!("Check {}: transfer not confirmed yet", checks);
                        }
                    }
                    PollerState::Paid | PollerState::Stopped => break handle.wait().await,
                }
            }
            _ = tokio::signal::ctrl_c() => {
                break handle.cancel().await;
            }
        }
    };

    let confirmation = Route::confirmation(&args.order_number, &args.email)
        .to_url(&context.flow.settings().storefront_url)?;
    if json {
        print_json(&json!({
            "orderNumber": args.order_number,
            "state": format!("{:?}", final_state),
            "confirmationUrl": (final_state == PollerState::Paid).then(|| confirmation.to_string()),
        }))?;
    } else if final_state == PollerState::Paid {
        println!("PayMe transfer confirmed. Confirmation: {}", confirmation);
    } else {
        println!("Stopped watching {}", args.order_number);
    }
    Ok(())
}

fn confirmation_url(context: &CheckoutContext, order: &Order) -> Result<Option<Url>> {
    let Some(email) = order.customer_email.as_deref() else {
        return Ok(None);
    };
    let url = Route::confirmation(&order.order_number, email)
        .to_url(&context.flow.settings().storefront_url)?;
    Ok(Some(url))
}

fn parse_url(value: &str) -> Result<Url, String> {
    Url::parse(value).map_err(|e| format!("invalid URL '{}': {}", value, e))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn render_order(order: &Order) {
    println!(
        "Order {} • status {} • payment {} • total {}",
        order.order_number, order.status, order.payment_status, order.total
    );
    if let Some(date) = order.delivery_date {
        println!("  delivery on {}", date);
    }
    if let Some(address) = order.delivery_address.as_deref() {
        println!("  to {}", address);
    }
    for item in &order.items {
        println!(
            "  - {} x{} @ {} = {}",
            item.name, item.quantity, item.unit_price, item.total
        );
    }
}
