/// Header row of the exported table, in column order.
pub const COLUMNS: [&str; 9] = [
    "Section",
    "Product Name",
    "Product URL",
    "Product Image",
    "Original Price",
    "Discounted Price",
    "Discount/Offer Text",
    "Brand Name",
    "Different Options",
];

/// One product card as found on a catalog page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductRecord {
    pub section: String,
    pub product_name: Option<String>,
    pub product_url: Option<String>,
    pub product_image: Option<String>,
    pub original_price: Option<String>,
    pub discounted_price: Option<String>,
    pub discount_text: Option<String>,
    pub brand_name: Option<String>,
    /// Option labels joined with `", "`.
    pub options: Option<String>,
}

impl ProductRecord {
    /// Cell values lined up with [`COLUMNS`].
    pub fn cells(&self) -> [Option<&str>; 9] {
        [
            Some(self.section.as_str()),
            self.product_name.as_deref(),
            self.product_url.as_deref(),
            self.product_image.as_deref(),
            self.original_price.as_deref(),
            self.discounted_price.as_deref(),
            self.discount_text.as_deref(),
            self.brand_name.as_deref(),
            self.options.as_deref(),
        ]
    }
}
