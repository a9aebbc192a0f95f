//! Charts module - Series shaping and image output

mod plotter;
mod renderer;

pub use plotter::{
    AxisKey, ChartKind, ChartPlotter, ChartSeries, DiscardSink, DisplayOptions, PlotSink,
    RenderError,
};
pub use renderer::StaticChartRenderer;
