// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! wicket - Embedded provisioning page
//!
//! Served from flash as a single self-contained document.  No external
//! resources: the client has no internet, that being rather the point.

/// The provisioning UI.  Lists nearby networks via `GET /scan`, submits
/// credentials via `POST /connect`.
pub(crate) const ROOT_PAGE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>WiFi Setup</title>
<style>
body { font-family: system-ui, sans-serif; max-width: 420px; margin: 2em auto; padding: 0 1em; color: #222; }
h1 { font-size: 1.4em; }
ul { list-style: none; padding: 0; }
li { padding: 0.5em; border-bottom: 1px solid #ddd; cursor: pointer; }
li:hover { background: #f0f0f0; }
label { display: block; margin-top: 1em; }
input { width: 100%; padding: 0.5em; margin-top: 0.25em; box-sizing: border-box; }
button { margin-top: 1.5em; padding: 0.6em 1.5em; font-size: 1em; }
#status { margin-top: 1em; font-weight: bold; }
#status.err { color: #b00; }
#status.ok { color: #070; }
</style>
</head>
<body>
<h1>Connect this device to WiFi</h1>
<p>Choose a network or type its name, then enter the password.</p>
<ul id="networks"><li>Scanning&hellip;</li></ul>
<form id="form">
<label>Network name
<input id="ssid" name="ssid" maxlength="32" required>
</label>
<label>Password
<input id="password" name="password" type="password" maxlength="64">
</label>
<button type="submit">Connect</button>
</form>
<div id="status"></div>
<script>
const list = document.getElementById('networks');
const status = document.getElementById('status');

fetch('/scan').then(r => r.json()).then(ssids => {
  list.innerHTML = '';
  if (ssids.length === 0) {
    list.innerHTML = '<li>No networks found</li>';
    return;
  }
  for (const ssid of ssids) {
    const li = document.createElement('li');
    li.textContent = ssid;
    li.onclick = () => { document.getElementById('ssid').value = ssid; };
    list.appendChild(li);
  }
}).catch(() => { list.innerHTML = '<li>Scan failed</li>'; });

document.getElementById('form').onsubmit = async (e) => {
  e.preventDefault();
  status.textContent = 'Connecting…';
  status.className = '';
  try {
    const resp = await fetch('/connect', {
      method: 'POST',
      headers: { 'Content-Type': 'application/json' },
      body: JSON.stringify({
        ssid: document.getElementById('ssid').value,
        password: document.getElementById('password').value
      })
    });
    const result = await resp.json();
    if (result.success) {
      status.textContent = 'Connected. This network will now disappear.';
      status.className = 'ok';
    } else {
      status.textContent = result.message || 'Connection failed';
      status.className = 'err';
    }
  } catch (err) {
    status.textContent = 'Device did not respond';
    status.className = 'err';
  }
};
</script>
</body>
</html>
"#;
