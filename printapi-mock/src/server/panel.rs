use rama::http::service::web::response::{Html, IntoResponse};

pub(super) async fn control_panel() -> impl IntoResponse {
    Html(CONTROL_PANEL_HTML)
}

// static page, everything it shows is fetched from the control api
const CONTROL_PANEL_HTML: &str = r##"<!doctype html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width,initial-scale=1">
<title>PrintAPI Mock</title>
<style>
body{margin:0;font:15px/1.45 system-ui,-apple-system,Segoe UI,Roboto,Helvetica,Arial;background:#0b0d1f;color:#eef0ff}
main{max-width:1100px;margin:0 auto;padding:24px}
h1{margin:0 0 4px;font-weight:800;letter-spacing:-.02em}
section{margin-top:24px;padding:16px;border-radius:12px;background:rgba(255,255,255,.05)}
label{display:inline-block;margin:0 16px 8px 0}
input,select,button{font:inherit;padding:6px 10px;border-radius:8px;border:1px solid #3b3f6b;background:#15183a;color:inherit}
button{cursor:pointer;background:#6f6cff;border:0;font-weight:700}
table{width:100%;border-collapse:collapse;font-size:13px}
th,td{text-align:left;padding:6px;border-bottom:1px solid rgba(255,255,255,.08)}
.muted{color:rgba(255,255,255,.6)}
.err{color:#ff8080}
</style>
</head>
<body>
<main>
<h1>PrintAPI Mock</h1>
<p class="muted">Upload route: <code id="routes">…</code></p>

<section>
<h2>Behavior</h2>
<label>Mode <select id="mode">
<option value="normal">normal</option>
<option value="error">error</option>
<option value="timeout">timeout</option>
</select></label>
<label>Error code <input id="errorCode" type="number" min="100" max="999"></label>
<label>Error message <input id="errorMessage" placeholder="derived from code"></label>
<label>Delay (ms) <input id="delayMs" type="number" min="0"></label>
<p>
<button id="apply">Apply</button>
<button id="reset">Reset</button>
<span id="status" class="muted"></span>
</p>
</section>

<section>
<h2>Inbox <button id="refresh">Refresh</button> <button id="clear">Clear</button></h2>
<table>
<thead><tr><th>Time</th><th>Request</th><th>File</th><th>Auth</th><th>Status</th><th>Mode</th><th>Note</th></tr></thead>
<tbody id="inbox"></tbody>
</table>
</section>
</main>
<script>
const $ = (id) => document.getElementById(id);

async function api(method, path, body) {
  const init = { method, headers: {} };
  if (body !== undefined) {
    init.headers["content-type"] = "application/json";
    init.body = JSON.stringify(body);
  }
  const resp = await fetch(path, init);
  const payload = await resp.json();
  if (!resp.ok) throw new Error(payload.error || resp.statusText);
  return payload;
}

function showBehavior(b) {
  $("mode").value = b.mode;
  $("errorCode").value = b.errorCode;
  $("errorMessage").value = b.errorMessage || "";
  $("delayMs").value = b.delayMs;
}

function setStatus(text, isError) {
  $("status").textContent = text;
  $("status").className = isError ? "err" : "muted";
}

function cell(text) {
  const td = document.createElement("td");
  td.textContent = text == null ? "" : String(text);
  return td;
}

async function loadInbox() {
  const entries = await api("GET", "/api/inbox");
  const rows = entries.map((e) => {
    const tr = document.createElement("tr");
    const file = e.fileName ? `${e.fileName} (${e.fileSize} bytes)` : "";
    const status = e.responseStatus === 0 ? "no response" : e.responseStatus;
    [e.timestamp, `${e.method} ${e.path}`, file, e.hasAuth ? "yes" : "no", status, e.chaosMode, e.note]
      .forEach((v) => tr.appendChild(cell(v)));
    return tr;
  });
  $("inbox").replaceChildren(...rows);
}

$("apply").onclick = async () => {
  try {
    showBehavior(await api("POST", "/api/behavior", {
      mode: $("mode").value,
      errorCode: $("errorCode").value,
      errorMessage: $("errorMessage").value,
      delayMs: $("delayMs").value,
    }));
    setStatus("applied");
  } catch (err) {
    setStatus(err.message, true);
  }
};
$("reset").onclick = async () => { showBehavior(await api("POST", "/api/behavior/reset")); setStatus("reset"); };
$("refresh").onclick = loadInbox;
$("clear").onclick = async () => { await api("POST", "/api/inbox/clear"); await loadInbox(); };

(async () => {
  const routes = await api("GET", "/api/routes");
  $("routes").textContent = `${routes.upload.method} ${routes.upload.paths.join(", ")}`;
  showBehavior(await api("GET", "/api/behavior"));
  await loadInbox();
  setInterval(loadInbox, 3000);
})();
</script>
</body>
</html>
"##;
