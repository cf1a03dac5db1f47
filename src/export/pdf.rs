//! Single-page PDF wrapping a JPEG image that fills the page.

use std::io::Write;

#[derive(Debug, Clone, PartialEq)]
pub struct PageGeometry {
    pub width_pt: f64,
    pub height_pt: f64,
}

/// Page keeps the given width; height follows the image aspect ratio.
pub fn page_for_image(image_width: u32, image_height: u32, width_pt: f64) -> PageGeometry {
    let height_pt = if image_width == 0 {
        0.0
    } else {
        width_pt * image_height as f64 / image_width as f64
    };
    PageGeometry { width_pt, height_pt }
}

/// UTF-16BE hex string with BOM, valid for any title text.
fn text_string(s: &str) -> String {
    let mut out = String::from("<FEFF");
    for unit in s.encode_utf16() {
        out.push_str(&format!("{:04X}", unit));
    }
    out.push('>');
    out
}

struct PdfWriter {
    buf: Vec<u8>,
    offsets: Vec<usize>,
}

impl PdfWriter {
    fn new() -> Self {
        let mut buf = Vec::new();
        buf.extend_from_slice(b"%PDF-1.4\n%\xE2\xE3\xCF\xD3\n");
        Self {
            buf,
            offsets: Vec::new(),
        }
    }

    fn object(&mut self, body: &str) {
        self.begin();
        self.buf.extend_from_slice(body.as_bytes());
        self.buf.extend_from_slice(b"\nendobj\n");
    }

    fn stream(&mut self, dict: &str, data: &[u8]) -> std::io::Result<()> {
        self.begin();
        write!(self.buf, "<< {} /Length {} >>\nstream\n", dict, data.len())?;
        self.buf.extend_from_slice(data);
        self.buf.extend_from_slice(b"\nendstream\nendobj\n");
        Ok(())
    }

    fn begin(&mut self) {
        self.offsets.push(self.buf.len());
        let n = self.offsets.len();
        self.buf.extend_from_slice(format!("{} 0 obj\n", n).as_bytes());
    }

    fn finish(mut self, root: usize, info: usize) -> std::io::Result<Vec<u8>> {
        let xref_at = self.buf.len();
        let size = self.offsets.len() + 1;
        write!(self.buf, "xref\n0 {}\n0000000000 65535 f \n", size)?;
        for off in &self.offsets {
            write!(self.buf, "{:010} 00000 n \n", off)?;
        }
        write!(
            self.buf,
            "trailer\n<< /Size {} /Root {} 0 R /Info {} 0 R >>\nstartxref\n{}\n%%EOF\n",
            size, root, info, xref_at
        )?;
        Ok(self.buf)
    }
}

pub fn jpeg_page_pdf(
    jpeg: &[u8],
    image_width: u32,
    image_height: u32,
    page: &PageGeometry,
    title: &str,
) -> std::io::Result<Vec<u8>> {
    let (w, h) = (page.width_pt, page.height_pt);
    let mut pdf = PdfWriter::new();
    pdf.object("<< /Type /Catalog /Pages 2 0 R >>");
    pdf.object("<< /Type /Pages /Kids [3 0 R] /Count 1 >>");
    pdf.object(&format!(
        "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {:.2} {:.2}] \
         /Resources << /XObject << /Im0 4 0 R >> >> /Contents 5 0 R >>",
        w, h
    ));
    pdf.stream(
        &format!(
            "/Type /XObject /Subtype /Image /Width {} /Height {} \
             /ColorSpace /DeviceRGB /BitsPerComponent 8 /Filter /DCTDecode",
            image_width, image_height
        ),
        jpeg,
    )?;
    let content = format!("q\n{:.2} 0 0 {:.2} 0 0 cm\n/Im0 Do\nQ", w, h);
    pdf.stream("", content.as_bytes())?;
    pdf.object(&format!(
        "<< /Producer (vsjxd) /Title {} >>",
        text_string(title)
    ));
    pdf.finish(1, 6)
}
