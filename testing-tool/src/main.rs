use colored::*;
use reqwest::Client;
use serde_json::Value;
use std::io::{self, Write};
use std::time::Instant;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", "🛒 POS Product Service - Testing Tool".bright_blue().bold());
    println!("{}", "=====================================".bright_blue());
    println!();

    let base_url = prompt("URL del servicio [http://localhost:8080]: ")?;
    let base_url = if base_url.is_empty() {
        "http://localhost:8080".to_string()
    } else {
        base_url.trim_end_matches('/').to_string()
    };
    let client = Client::new();

    health(&client, &base_url).await?;

    loop {
        println!();
        println!("{}", "📋 MENÚ PRINCIPAL".bright_green().bold());
        println!("{}", "==================".bright_green());
        println!("1. 🔍 Buscar producto por código de barras");
        println!("2. ⏱️  Medir latencia (lookups repetidos)");
        println!("3. 📊 Estadísticas del cache");
        println!("4. 📣 Notificar actualización de lista de precios");
        println!("5. 📣 Notificar actualización de productos");
        println!("6. 🧹 Invalidar toda la cache");
        println!("7. 🚪 Salir");
        let choice = prompt("Selecciona una opción (1-7): ")?;

        match choice.as_str() {
            "1" => {
                let codigo = prompt("Código de barras: ")?;
                lookup(&client, &base_url, &codigo).await?;
            }
            "2" => {
                let codigo = prompt("Código de barras: ")?;
                let veces: usize = prompt("Repeticiones [100]: ")?.parse().unwrap_or(100);
                benchmark(&client, &base_url, &codigo, veces).await?;
            }
            "3" => {
                let body = call(&client, reqwest::Method::GET, &format!("{}/api/v1/pos/cache-stats", base_url)).await?;
                print_json(&body)?;
            }
            "4" => {
                let url = format!("{}/api/v1/pos/cache/notify-lista-precios-update", base_url);
                print_json(&call(&client, reqwest::Method::POST, &url).await?)?;
            }
            "5" => {
                let url = format!("{}/api/v1/pos/cache/notify-productos-update", base_url);
                print_json(&call(&client, reqwest::Method::POST, &url).await?)?;
            }
            "6" => {
                let url = format!("{}/api/v1/pos/cache/all", base_url);
                print_json(&call(&client, reqwest::Method::DELETE, &url).await?)?;
            }
            "7" => {
                println!("{}", "👋 ¡Hasta luego!".bright_green());
                break;
            }
            _ => {
                println!("{}", "❌ Opción inválida. Intenta de nuevo.".bright_red());
            }
        }
    }

    Ok(())
}

fn prompt(label: &str) -> Result<String, Box<dyn std::error::Error>> {
    print!("{}", label.bright_yellow());
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}

async fn call(client: &Client, method: reqwest::Method, url: &str) -> Result<Value, Box<dyn std::error::Error>> {
    let response = client.request(method, url).send().await?;
    let status = response.status();
    let body: Value = response.json().await.unwrap_or(Value::Null);

    if status.is_success() {
        println!("{} {}", "✅".green(), status);
    } else {
        println!("{} {}", "❌".red(), status.to_string().bright_red());
    }
    Ok(body)
}

fn print_json(body: &Value) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(body)?);
    Ok(())
}

async fn health(client: &Client, base_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", "🩺 HEALTH CHECK".bright_cyan().bold());
    let body = call(client, reqwest::Method::GET, &format!("{}/health", base_url)).await?;
    println!("   PostgreSQL: {}", body["checks"]["database"]["status"]);
    println!("   Redis:      {}", body["checks"]["redis"]["status"]);
    Ok(())
}

async fn lookup(client: &Client, base_url: &str, codigo: &str) -> Result<(), Box<dyn std::error::Error>> {
    let url = format!("{}/api/v1/pos/producto/{}", base_url, codigo);
    let body = call(client, reqwest::Method::GET, &url).await?;

    let data = &body["data"];
    if data.is_null() {
        print_json(&body)?;
        return Ok(());
    }

    let hit = data["cache_hit"].as_bool().unwrap_or(false);
    println!(
        "   {} {} ({:.3} ms)",
        data["producto"]["nombre"],
        if hit { "CACHE HIT".green() } else { "CACHE MISS".yellow() },
        data["latency_ms"].as_f64().unwrap_or_default()
    );
    println!("   Precio detalle: {}", data["producto"]["lista_precio_detalle"]);
    Ok(())
}

async fn benchmark(client: &Client, base_url: &str, codigo: &str, veces: usize) -> Result<(), Box<dyn std::error::Error>> {
    let url = format!("{}/api/v1/pos/producto/{}", base_url, codigo);
    let mut latencias = Vec::with_capacity(veces);
    let mut hits = 0;

    for _ in 0..veces {
        let start = Instant::now();
        let body: Value = client.get(&url).send().await?.json().await?;
        latencias.push(start.elapsed().as_secs_f64() * 1000.0);
        if body["data"]["cache_hit"].as_bool().unwrap_or(false) {
            hits += 1;
        }
    }

    if latencias.is_empty() {
        return Ok(());
    }
    latencias.sort_by(|a, b| a.total_cmp(b));
    let p50 = latencias[latencias.len() / 2];
    let p99 = latencias[(latencias.len() * 99 / 100).min(latencias.len() - 1)];

    println!("{}", "📈 RESULTADOS".bright_cyan().bold());
    println!("   Requests: {}  Hits: {}", veces, hits);
    println!("   p50: {:.3} ms  p99: {:.3} ms (ida y vuelta HTTP)", p50, p99);
    Ok(())
}
