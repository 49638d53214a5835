use cursive::{
    align::HAlign,
    theme::{ColorStyle, Effect, PaletteColor},
    views::TextView,
    Printer, Vec2, View,
};

/// Full screen backdrop with a title at the top left and a footer at the
/// bottom right.
pub struct BannerView {
    title: TextView,
    footer: TextView,
}

impl BannerView {
    pub fn new(title: &str, footer: &str) -> Self {
        Self {
            title: TextView::new(title).style(Effect::Bold),
            footer: TextView::new(footer)
                .h_align(HAlign::Right)
                .style(Effect::Dim),
        }
    }
}

impl View for BannerView {
    fn draw(&self, printer: &Printer) {
        let style = ColorStyle::new(PaletteColor::View, PaletteColor::Background);

        let mut title_printer = printer.offset((1, 1)).shrinked((1, 0));
        title_printer.set_color(style);
        self.title.draw(&title_printer);

        let mut footer_printer = printer
            .offset((1, printer.size.y.saturating_sub(2)))
            .shrinked((1, 0));
        footer_printer.set_color(style);
        self.footer.draw(&footer_printer);
    }

    fn layout(&mut self, size: Vec2) {
        let inner = Vec2::new(size.x.saturating_sub(2), size.y.saturating_sub(1));

        self.title.layout(inner);
        self.footer.layout(inner);
    }

    fn needs_relayout(&self) -> bool {
        self.title.needs_relayout() || self.footer.needs_relayout()
    }

    fn required_size(&mut self, constraint: Vec2) -> Vec2 {
        constraint
    }
}
