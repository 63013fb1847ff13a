/// 画像を1枚選んで分類するだけのページ
pub const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>Measurement ROI Classifier</title>
<style>
  body { font-family: sans-serif; max-width: 640px; margin: 2rem auto; }
  label { display: block; margin-top: 1rem; }
  img { max-width: 100%; margin-top: 1rem; }
</style>
</head>
<body>
<h1>Measurement ROI Classifier</h1>
<p>Upload an ROI crop. Output: recognized vs not_recognized (threshold 0.8).</p>
<input id="file" type="file" accept="image/*">
<button id="classify">Classify</button>
<label>Prediction <input id="label" type="text" readonly></label>
<label>Confidence (recognized) <input id="confidence" type="number" step="0.0001" readonly></label>
<img id="preview" alt="">
<script>
const fileInput = document.getElementById("file");
const preview = document.getElementById("preview");
let dataUrl = null;

fileInput.addEventListener("change", () => {
  const file = fileInput.files[0];
  if (!file) { dataUrl = null; preview.src = ""; return; }
  const reader = new FileReader();
  reader.onload = () => { dataUrl = reader.result; preview.src = dataUrl; };
  reader.readAsDataURL(file);
});

document.getElementById("classify").addEventListener("click", async () => {
  const response = await fetch("/api/predict", {
    method: "POST",
    headers: { "Content-Type": "application/json" },
    body: JSON.stringify({ image: dataUrl }),
  });
  let body = {};
  try {
    body = await response.json();
  } catch (e) {
    // 413 などは JSON 以外の本文で返る
    body = { error: response.status + " " + response.statusText };
  }
  if (!response.ok) {
    document.getElementById("label").value = body.error || ("Error " + response.status);
    document.getElementById("confidence").value = "";
    return;
  }
  document.getElementById("label").value = body.label;
  document.getElementById("confidence").value = body.confidence;
});
</script>
</body>
</html>
"#;
