use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::{IpAddr, SocketAddr};

/// HTTP listener configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub debug: bool,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5000
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: default_host(),
            port: default_port(),
            debug: false,
        }
    }
}

impl ServerConfig {
    fn validate(&self) -> Result<()> {
        self.socket_addr().map(|_| ())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr> {
        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|e| anyhow!("Invalid host '{}': {}", self.host, e))?;
        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Field sampling and plot style
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlotConfig {
    #[serde(default = "default_resolution")]
    pub resolution: usize, // Samples per axis
    #[serde(default = "default_padding")]
    pub padding: f64, // Margin around the outermost wire (data units)
    #[serde(default = "default_dpi")]
    pub dpi: u32,
    #[serde(default = "default_density")]
    pub density: f64,
    #[serde(default = "default_line_width")]
    pub line_width: u32,
    #[serde(default = "default_arrow_size")]
    pub arrow_size: f64,
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default = "default_x_label")]
    pub x_label: String,
    #[serde(default = "default_y_label")]
    pub y_label: String,
    #[serde(default = "default_min_image_side")]
    pub min_image_side: u32,
    #[serde(default = "default_max_image_side")]
    pub max_image_side: u32,
    #[serde(default)]
    pub color_by_strength: bool,
}

/// Upper bound on `density`; the tracer mask grows with its square.
pub const MAX_DENSITY: f64 = 10.0;

fn default_resolution() -> usize {
    100
}

fn default_padding() -> f64 {
    2.0
}

fn default_dpi() -> u32 {
    100
}

fn default_density() -> f64 {
    2.0
}

fn default_line_width() -> u32 {
    1
}

fn default_arrow_size() -> f64 {
    2.0
}

fn default_title() -> String {
    "Magnetic field lines from direct conductors".to_string()
}

fn default_x_label() -> String {
    "x".to_string()
}

fn default_y_label() -> String {
    "y".to_string()
}

fn default_min_image_side() -> u32 {
    200
}

fn default_max_image_side() -> u32 {
    4000
}

impl Default for PlotConfig {
    fn default() -> Self {
        PlotConfig {
            resolution: default_resolution(),
            padding: default_padding(),
            dpi: default_dpi(),
            density: default_density(),
            line_width: default_line_width(),
            arrow_size: default_arrow_size(),
            title: default_title(),
            x_label: default_x_label(),
            y_label: default_y_label(),
            min_image_side: default_min_image_side(),
            max_image_side: default_max_image_side(),
            color_by_strength: false,
        }
    }
}

impl PlotConfig {
    fn validate(&self) -> Result<()> {
        if self.resolution < 2 {
            return Err(anyhow!("resolution must be at least 2, got {}", self.resolution));
        }
        if self.padding <= 0.0 || !self.padding.is_finite() {
            return Err(anyhow!("padding must be positive, got {}", self.padding));
        }
        if self.dpi == 0 {
            return Err(anyhow!("dpi must be positive"));
        }
        if self.density <= 0.0 || self.density > MAX_DENSITY || !self.density.is_finite() {
            return Err(anyhow!(
                "density must be in (0, {}], got {}",
                MAX_DENSITY,
                self.density
            ));
        }
        if self.line_width == 0 {
            return Err(anyhow!("line_width must be positive"));
        }
        if self.arrow_size < 0.0 || !self.arrow_size.is_finite() {
            return Err(anyhow!("arrow_size must be non-negative, got {}", self.arrow_size));
        }
        if self.min_image_side < 120 {
            return Err(anyhow!(
                "min_image_side must be at least 120 pixels, got {}",
                self.min_image_side
            ));
        }
        if self.min_image_side > self.max_image_side {
            return Err(anyhow!(
                "min_image_side ({}) exceeds max_image_side ({})",
                self.min_image_side,
                self.max_image_side
            ));
        }
        Ok(())
    }
}

/// Complete service configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub plot: PlotConfig,
}

impl AppConfig {
    /// Load configuration from TOML file
    pub fn from_file(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| anyhow!("Failed to read config file '{}': {}", path, e))?;

        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: AppConfig =
            toml::from_str(content).map_err(|e| anyhow!("Failed to parse TOML config: {}", e))?;

        config.validate()?;

        Ok(config)
    }

    /// Validate all configuration parameters
    pub fn validate(&self) -> Result<()> {
        self.server.validate()?;
        self.plot.validate()?;
        Ok(())
    }
}
