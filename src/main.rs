//! # Minuta CLI
//!
//! Usage:
//!   minuta render --template t.html --data d.json --title "Requerimento" -o out.pdf
//!   minuta render --request request.json --out-dir downloads/
//!   minuta preview --template t.html --data d.json --schema s.json
//!   minuta classify --template t.html --data d.json --title "Declaração"
//!   minuta example > request.json

use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process;

use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use log::{info, LevelFilter};

use minuta::preview::{render_editable, PreviewOptions};
use minuta::render::{BufferSink, DocumentRenderer, FileSink};
use minuta::{DocumentRequest, FormSchema, LayoutType, MinutaError, RenderConfig, Result, UserData};

#[derive(Parser)]
#[command(name = "minuta", version, about = "Render form data into legal document templates")]
struct Cli {
    /// error, warn, info, debug or trace
    #[arg(long, global = true, default_value = "info",
          value_parser = ["error", "warn", "info", "debug", "trace"])]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Render a document to PDF.
    Render {
        #[command(flatten)]
        input: DocumentArgs,
        /// A whole request as JSON, instead of --template/--data/--title
        #[arg(long, conflicts_with_all = ["template", "data", "title"])]
        request: Option<PathBuf>,
        /// Render configuration (JSON)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Date for a synthesized date line (default: today)
        #[arg(long)]
        issued_on: Option<NaiveDate>,
        /// Output file
        #[arg(short = 'o', long, conflicts_with = "out_dir")]
        output: Option<PathBuf>,
        /// Directory for the download, named after title and applicant
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },
    /// Print the editable preview tree as JSON.
    Preview {
        #[command(flatten)]
        input: DocumentArgs,
        /// Form schema (JSON)
        #[arg(long)]
        schema: Option<PathBuf>,
    },
    /// Print the layout type and header/footer decision as JSON.
    Classify {
        #[command(flatten)]
        input: DocumentArgs,
    },
    /// Print a sample request.
    Example,
}

#[derive(clap::Args)]
struct DocumentArgs {
    /// Template file (HTML)
    #[arg(long)]
    template: Option<PathBuf>,
    /// User data file (JSON), or - for stdin
    #[arg(long)]
    data: Option<PathBuf>,
    #[arg(long)]
    title: Option<String>,
    /// official, declaration or letter (default: inferred from the title)
    #[arg(long)]
    layout: Option<LayoutType>,
}

impl DocumentArgs {
    fn into_request(self) -> Result<DocumentRequest> {
        let template_path = self
            .template
            .ok_or_else(|| MinutaError::Config("--template is required".into()))?;
        let template = fs::read_to_string(template_path)?;
        let data = match self.data {
            Some(path) => UserData::from_json_str(&read_input(&path)?)?,
            None => UserData::new(),
        };
        let mut request = DocumentRequest::new(template, data, self.title.unwrap_or_default());
        request.layout = self.layout;
        Ok(request)
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    if let Err(e) = run(cli.command) {
        eprintln!("✗ {e}");
        process::exit(1);
    }
}

fn init_logging(level: &str) {
    let level = match level {
        "trace" => LevelFilter::Trace,
        "debug" => LevelFilter::Debug,
        "warn" => LevelFilter::Warn,
        "error" => LevelFilter::Error,
        _ => LevelFilter::Info,
    };
    env_logger::Builder::new().filter(None, level).init();
}

fn run(command: Command) -> Result<()> {
    match command {
        Command::Render {
            input,
            request,
            config,
            issued_on,
            output,
            out_dir,
        } => {
            let mut request = match request {
                Some(path) => serde_json::from_str::<DocumentRequest>(&read_input(&path)?)?,
                None => input.into_request()?,
            };
            if request.issued_on.is_none() {
                request.issued_on = Some(issued_on.unwrap_or_else(|| Local::now().date_naive()));
            }

            let renderer = DocumentRenderer::new(load_config(config.as_deref())?)?;
            match output {
                Some(path) => {
                    let mut sink = BufferSink::new();
                    let rendered = renderer.render_to(&request, &mut sink)?;
                    fs::write(&path, sink.into_bytes())?;
                    eprintln!(
                        "✓ Written {} page(s) to {}",
                        rendered.page_count,
                        path.display()
                    );
                }
                None => {
                    let mut sink = FileSink::new(out_dir.unwrap_or_else(|| PathBuf::from(".")));
                    let rendered = renderer.render_to(&request, &mut sink)?;
                    for path in sink.written() {
                        eprintln!("✓ Written {} page(s) to {}", rendered.page_count, path.display());
                    }
                }
            }
        }
        Command::Preview { input, schema } => {
            let request = input.into_request()?;
            let schema = match schema {
                Some(path) => FormSchema::from_json_str(&fs::read_to_string(path)?)?,
                None => FormSchema::default(),
            };
            let options = PreviewOptions {
                title: request.title.clone(),
                layout: request.layout,
                ..PreviewOptions::default()
            };
            let tree = render_editable(&request.template, &request.data, &schema, &options)?;
            println!("{}", serde_json::to_string_pretty(&tree)?);
        }
        Command::Classify { input } => {
            let request = input.into_request()?;
            let laid_out = DocumentRenderer::default().layout(&request)?;
            info!("{} page(s)", laid_out.pages.len());
            println!("{}", serde_json::to_string_pretty(&laid_out.shape)?);
        }
        Command::Example => print!("{}", example_request_json()),
    }
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<RenderConfig> {
    match path {
        Some(path) => RenderConfig::load(path),
        None => Ok(RenderConfig::default()),
    }
}

fn read_input(path: &Path) -> Result<String> {
    if path.as_os_str() == "-" {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf)?;
        return Ok(buf);
    }
    Ok(fs::read_to_string(path)?)
}

fn example_request_json() -> &'static str {
    r##"{
  "title": "Requerimento de DUAT",
  "template": "<p>Eu, <strong>{{full_name}}</strong>, portador do BI n.º {{id_number}}, residente no bairro {{neighbourhood}}, venho por este meio requerer a V. Ex.ª a atribuição do Direito de Uso e Aproveitamento da Terra sobre a parcela abaixo identificada.</p><p class=\"ql-align-center\"><strong>IDENTIFICAÇÃO DA PARCELA</strong></p>{{#plots}}<p>Parcela n.º {{number}}, com a área de {{area}} m², situada em {{location}}.</p>{{/plots}}<p>Mais declaro que as informações prestadas são verdadeiras.</p>",
  "data": {
    "full_name": "Ana Paulo Machava",
    "id_number": "110100123456B",
    "neighbourhood": "Polana Caniço A",
    "target_authority": "Exmo. Senhor Presidente do Conselho Municipal",
    "institution_name": "Conselho Municipal da Cidade de Maputo",
    "subject": "Pedido de DUAT",
    "current_city": "Maputo",
    "plots": [
      { "number": "1024", "area": "600", "location": "Marracuene" },
      { "number": "1025", "area": "450", "location": "Marracuene" }
    ]
  }
}
"##
}
