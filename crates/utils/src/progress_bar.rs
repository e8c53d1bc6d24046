/// Creates a progress bar over a collection with a `len()`.
#[macro_export]
macro_rules! init_progress {
    ($local:expr, $label:expr) => {{
        pub fn eta_key(state: &$crate::progress_bar::ProgressState, f: &mut dyn std::fmt::Write) {
            let _ = write!(f, "{:.1}s", state.eta().as_secs_f64());
        }

        let pb = $crate::progress_bar::ProgressBar::new($local.len() as u64);
        let mut template =
            "{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} ".to_string();
        template += $label;
        template += " ({eta})";
        if let Ok(style) = $crate::progress_bar::ProgressStyle::with_template(&template) {
            pb.set_style(style.with_key("eta", eta_key).progress_chars("#>-"));
        }
        pb.set_position(0);
        pb
    }};
}

#[macro_export]
macro_rules! update_progress {
    ($pb:ident, $index:expr) => {
        $pb.set_position(($index + 1) as u64);
    };
}

pub use indicatif::{ProgressBar, ProgressState, ProgressStyle};
